use clap::ValueEnum;

/// What to do when a destination folder does not exist yet.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateDirs {
    /// Ask on the terminal
    Prompt,
    /// Create without asking
    Yes,
    /// Never create; skip the download
    No,
}
