use owo_colors::OwoColorize;

pub fn print_banner() {
    let banner = r#"
  ___      _
 | _ \__ _| |__ ___ _____ _ _
 |  _/ _` | / _` \ V / -_) '_|
 |_| \__,_|_\__,_|\_/\___|_|
"#;
    println!("{}", banner.bright_green());
    println!("{}", "    terminal chat".dimmed());
}
