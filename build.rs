use clap::ValueEnum;

include!("src/cli.rs");

/// (subcommand case label, alias case labels) for every subcommand with visible aliases
fn alias_cases(cmd: &Command) -> Vec<(String,Vec<String>)> {
    cmd.get_subcommands()
        .map(|sub| (format!("({})",sub.get_name()),sub.get_visible_aliases().map(|a| format!("({})",a)).collect::<Vec<String>>()))
        .filter(|(_,aliases)| aliases.len() > 0)
        .collect()
}

/// The zsh generator only writes a case arm for the real subcommand name, copy the arm for each alias.
/// Options are also allowed to take their value after a space.
fn refine_zsh(script: &str,cases: &[(String,Vec<String>)]) -> String {
    let eq_patt = regex::RegexBuilder::new(r"^'--(\w+)=\[").multi_line(true).build().expect("regex parsing error");
    let intermediate = eq_patt.replace_all(script, "'--$1+[");
    let mut new_script = String::new();
    let mut arm: Option<(String,&[String])> = None;
    for line in intermediate.lines() {
        if let Some((_,aliases)) = cases.iter().find(|(label,_)| label==line) {
            arm = Some((format!("{}\n",line),aliases.as_slice()));
            continue;
        }
        match arm.as_mut() {
            Some((accum,aliases)) => {
                accum.push_str(line);
                accum.push('\n');
                if line==";;" {
                    new_script.push_str(accum);
                    let label = accum.lines().next().unwrap_or("").to_string();
                    for alias in aliases.iter() {
                        new_script += &accum.replacen(&label,alias,1);
                    }
                    arm = None;
                }
            },
            None => {
                new_script += line;
                new_script += "\n";
            }
        }
    }
    new_script
}

fn main() -> Result<(), std::io::Error> {
    if std::env::var("DOCS_RS").is_ok() {
        return Ok(());
    }
    let outdir = match std::env::var_os("CARGO_MANIFEST_DIR") {
        None => return Ok(()),
        Some(root) => std::path::Path::new(&root).join("completions"),
    };
    std::fs::create_dir_all(&outdir)?;
    let mut cmd = build_cli();
    let cases = alias_cases(&cmd);
    for &shell in clap_complete::Shell::value_variants() {
        let path = clap_complete::generate_to(shell, &mut cmd, "a8kit", &outdir)?;
        if shell==clap_complete::Shell::Zsh {
            let script = std::fs::read_to_string(&path)?;
            std::fs::write(&path,refine_zsh(&script,&cases))?;
        }
    }
    Ok(())
}
