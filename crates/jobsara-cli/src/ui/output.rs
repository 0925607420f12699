//! Formatted output utilities.

use console::style;

/// Print a success message with checkmark.
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message with X.
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    println!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message.
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header/section title.
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print the JobSara banner.
pub fn banner() {
    println!(
        "{}",
        style(
            r"
      _       _     ____
     | | ___ | |__ / ___|  __ _ _ __ __ _
  _  | |/ _ \| '_ \\___ \ / _` | '__/ _` |
 | |_| | (_) | |_) |___) | (_| | | | (_| |
  \___/ \___/|_.__/|____/ \__,_|_|  \__,_|
"
        )
        .cyan()
    );
    println!(
        "  {} {}\n",
        style("JobSara").bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).bold(), value);
}
