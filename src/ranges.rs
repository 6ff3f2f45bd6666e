//! # Range collapsing
//!
//! Index arrays and per-byte value arrays can be large, so they are persisted
//! in collapsed form.  Index arrays become a list whose entries are either a single
//! index or a `[start,end]` pair (end exclusive).  Value arrays become `[value,start,end]` runs.

use log::error;

/// One element of a collapsed index array
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum IndexRange {
    Single(usize),
    Span(usize,usize)
}

/// Group monotonically increasing runs of `src`.  If `compact`, one element runs
/// are stored as `Single`.
pub fn collapse_to_ranges(src: &[usize],compact: bool) -> Vec<IndexRange> {
    let mut ans = Vec::new();
    if src.len()==0 {
        return ans;
    }
    let mut start = src[0];
    let mut prev = src[0];
    for i in 1..src.len() {
        if src[i] != prev.wrapping_add(1) {
            ans.push(make_range(start,prev+1,compact));
            start = src[i];
        }
        prev = src[i];
    }
    ans.push(make_range(start,prev+1,compact));
    ans
}

fn make_range(start: usize,end: usize,compact: bool) -> IndexRange {
    if compact && end==start+1 {
        IndexRange::Single(start)
    } else {
        IndexRange::Span(start,end)
    }
}

/// Expand collapsed ranges back into the original index array
pub fn restore_from_ranges(ranges: &[IndexRange]) -> Vec<usize> {
    let mut ans = Vec::new();
    for r in ranges {
        match r {
            IndexRange::Single(i) => ans.push(*i),
            IndexRange::Span(start,end) => ans.extend(*start..*end)
        }
    }
    ans
}

/// Produce `[value,start,end]` runs, a new run starts whenever the value changes.
pub fn collapse_values(src: &[u8]) -> Vec<(u8,usize,usize)> {
    let mut ans = Vec::new();
    if src.len()==0 {
        return ans;
    }
    let mut start = 0;
    for i in 1..src.len() {
        if src[i] != src[start] {
            ans.push((src[start],start,i));
            start = i;
        }
    }
    ans.push((src[start],start,src.len()));
    ans
}

/// Overwrite `dest` with the runs produced by `collapse_values`, runs extending
/// past the end of `dest` are truncated.
pub fn restore_values(dest: &mut [u8],runs: &[(u8,usize,usize)]) {
    for (val,start,end) in runs {
        let end = usize::min(*end,dest.len());
        if *start < end {
            dest[*start..end].fill(*val);
        }
    }
}

/// Ranges `[start,end)` where the predicate is true
pub fn bool_to_ranges(matches: &[bool]) -> Vec<(usize,usize)> {
    let mut ans = Vec::new();
    let mut maybe_start: Option<usize> = None;
    for i in 0..matches.len() {
        match (matches[i],maybe_start) {
            (true,None) => maybe_start = Some(i),
            (false,Some(start)) => {
                ans.push((start,i));
                maybe_start = None;
            },
            _ => {}
        }
    }
    if let Some(start) = maybe_start {
        ans.push((start,matches.len()));
    }
    ans
}

pub fn ranges_to_json(ranges: &[IndexRange]) -> json::JsonValue {
    let mut ans = json::JsonValue::new_array();
    for r in ranges {
        let item = match r {
            IndexRange::Single(i) => json::JsonValue::from(*i),
            IndexRange::Span(start,end) => json::array![*start,*end]
        };
        // pushing onto an array cannot fail
        let _ = ans.push(item);
    }
    ans
}

pub fn ranges_from_json(obj: &json::JsonValue) -> Option<Vec<IndexRange>> {
    if !obj.is_array() {
        error!("index ranges should be an array");
        return None;
    }
    let mut ans = Vec::new();
    for item in obj.members() {
        if let Some(i) = item.as_usize() {
            ans.push(IndexRange::Single(i));
        } else if item.is_array() && item.len()==2 {
            match (item[0].as_usize(),item[1].as_usize()) {
                (Some(start),Some(end)) if start <= end => ans.push(IndexRange::Span(start,end)),
                _ => return None
            }
        } else {
            return None;
        }
    }
    Some(ans)
}

pub fn values_to_json(runs: &[(u8,usize,usize)]) -> json::JsonValue {
    let mut ans = json::JsonValue::new_array();
    for (val,start,end) in runs {
        let _ = ans.push(json::array![*val,*start,*end]);
    }
    ans
}

pub fn values_from_json(obj: &json::JsonValue) -> Option<Vec<(u8,usize,usize)>> {
    let mut ans = Vec::new();
    for item in obj.members() {
        match (item[0].as_u8(),item[1].as_usize(),item[2].as_usize()) {
            (Some(val),Some(start),Some(end)) => ans.push((val,start,end)),
            _ => return None
        }
    }
    Some(ans)
}
