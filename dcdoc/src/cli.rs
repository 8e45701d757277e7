use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

use dcdoc::config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "dcdoc")]
#[command(about = "Generate documentation for device control policies")]
pub struct Cli {
    #[command(flatten)]
    pub input: InputArgs,
    /// Source directories, separated like PATH. Defaults to the current directory.
    #[arg(short, long)]
    pub path: Option<String>,
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Output file for --query.
    #[arg(short, long)]
    pub output: Option<String>,
    /// Output directory. Defaults to the current directory.
    #[arg(short, long)]
    pub dest: Option<PathBuf>,
    /// Generate files for other formats, as fmt:dir[,fmt:dir] with fmt one of gpo, oma-uri, mac.
    #[arg(short, long)]
    pub generate: Option<String>,
    /// README written for --scenarios. Defaults to readme.md.
    #[arg(short, long)]
    pub readme: Option<String>,
    /// Report title.
    #[arg(long, env = "TITLE")]
    pub title: Option<String>,
    /// Report template name. Defaults to the built-in dcdoc.md.j2.
    #[arg(short, long)]
    pub template: Option<String>,
    /// README template name for --scenarios. Defaults to the built-in readme.md.j2.
    #[arg(long)]
    pub readme_template: Option<String>,
    /// Template for generated descriptions. Defaults to the built-in description.md.j2.
    #[arg(long)]
    pub description_template: Option<String>,
    /// Template directories searched before the built-in templates, separated like PATH.
    #[arg(long)]
    pub templates_path: Option<String>,
    /// Optional TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Log filter (for example `info` or `dcdoc=debug`).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct InputArgs {
    /// Query selecting the rules to document, for example `path.str.contains('usb')`.
    #[arg(short, long, env = "DC_QUERY")]
    pub query: Option<String>,
    /// JSON file listing the scenarios to document.
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,
    /// A single policy file to document.
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Csv,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            paths: self.path.clone(),
            dest: self.dest.clone(),
            generate: self.generate.clone(),
            readme: self.readme.clone(),
            title: self.title.clone(),
            templates_path: self.templates_path.clone(),
            template: self.template.clone(),
            readme_template: self.readme_template.clone(),
            description_template: self.description_template.clone(),
        }
    }
}
