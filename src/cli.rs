use crate::config::{AppConfigOverrides, DEFAULT_CONFIG_PATH};
use crate::coordinator::RequestSource;
use crate::import::SourceLocator;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "gltf_viewer", about = "Load and inspect glTF/GLB models", version)]
pub struct CliArgs {
    /// Model path or URI to import on startup
    #[arg(value_name = "MODEL")]
    pub model: Option<String>,

    /// Wait this many milliseconds before the import starts
    #[arg(long = "delay-ms", alias = "delay", value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Time every import step and log the report when the import ends
    #[arg(long)]
    pub profile: bool,

    /// Exit once the startup import finishes, whatever its outcome
    #[arg(long)]
    pub quit_after_load: bool,

    /// Run the tick loop without opening a window
    #[arg(long)]
    pub headless: bool,

    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Host tick interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub frame_interval_ms: Option<u64>,
}

impl CliArgs {
    pub fn parse_from_env() -> Result<Self, clap::Error> {
        Self::try_parse()
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::try_parse_from(args)?)
    }

    /// Flags only override the config file when given; absent switches leave it alone.
    pub fn config_overrides(&self) -> AppConfigOverrides {
        AppConfigOverrides {
            width: self.width,
            height: self.height,
            delay_ms: self.delay_ms,
            profile: self.profile.then_some(true),
            quit_after_load: self.quit_after_load.then_some(true),
            headless: self.headless.then_some(true),
            frame_interval_ms: self.frame_interval_ms,
        }
    }

    /// OS launchers hand over URIs; a person typing a command passes a path.
    pub fn startup_request_source(&self) -> Option<RequestSource> {
        let model = self.model.as_deref()?;
        match SourceLocator::parse(model) {
            Ok(locator) if locator.is_uri() => Some(RequestSource::FileAssociation),
            _ => Some(RequestSource::CommandLine),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_and_pipeline_flags() {
        let args = ["app", "model.glb", "--delay-ms", "1000", "--profile", "--quit-after-load"];
        let cli = CliArgs::parse(args).expect("parse cli");
        assert_eq!(cli.model.as_deref(), Some("model.glb"));
        let overrides = cli.config_overrides();
        assert_eq!(overrides.delay_ms, Some(1000));
        assert_eq!(overrides.profile, Some(true));
        assert_eq!(overrides.quit_after_load, Some(true));
        assert_eq!(overrides.headless, None);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn delay_alias_is_accepted() {
        let cli = CliArgs::parse(["app", "--delay", "5"]).expect("parse cli");
        assert_eq!(cli.delay_ms, Some(5));
        assert!(cli.model.is_none());
        assert!(cli.config_overrides().applied_fields() == vec!["delay_ms"]);
    }

    #[test]
    fn classifies_startup_source() {
        let path = CliArgs::parse(["app", "scenes/duck.gltf"]).expect("parse cli");
        assert_eq!(path.startup_request_source(), Some(RequestSource::CommandLine));
        let uri = CliArgs::parse(["app", "content://media/7"]).expect("parse cli");
        assert_eq!(uri.startup_request_source(), Some(RequestSource::FileAssociation));
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliArgs::parse(["app", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("--foo"), "unknown flags should error: {err}");
    }

    #[test]
    fn rejects_negative_delay() {
        assert!(CliArgs::parse(["app", "--delay-ms", "-5"]).is_err());
    }
}
