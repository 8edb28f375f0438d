use std::io::{self, Write};

pub fn read_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Prompt with the current value shown; an empty answer keeps it.
pub fn read_line_or_keep(prompt: &str, current: &str) -> io::Result<String> {
    let answer = read_line(&format!("{prompt} [{current}]: "))?;
    if answer.is_empty() {
        Ok(current.to_string())
    } else {
        Ok(answer)
    }
}
