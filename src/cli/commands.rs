use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration as JSON
    Show,
    /// Print where the configuration file lives
    Path,
    /// Change one setting (interval, soundVolume, character, showPet, birthday)
    Set {
        key: String,
        value: String,
    },
}
