use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Convert a Spine 3.8 JSON skeleton export into the binary `.skel` format.
#[derive(Debug, Parser)]
#[command(name = "spineskel", version)]
struct Cli {
    /// Skeleton JSON exported from Spine 3.8.
    input: PathBuf,

    /// Output path; defaults to the input with a `.skel` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Atlas file whose region names filter renderable attachments.
    #[arg(short, long)]
    atlas: Option<PathBuf>,

    /// Log per-animation progress.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output(&self.input))
    }
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("skel")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let atlas = cli
        .atlas
        .as_ref()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .transpose()?;

    let mut skel = Vec::with_capacity(json.len());
    let written = match spineskel::encode(&json, &mut skel, atlas.as_deref()) {
        Ok(written) => written,
        Err(e) => bail!("{} (code {})", e, e.code()),
    };

    let output = cli.output_path();
    fs::write(&output, &skel)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        output = %output.display(),
        bytes = written,
        "converted skeleton"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, default_output};
    use clap::Parser;
    use std::path::{Path, PathBuf};

    #[test]
    fn arguments_are_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn minimal_invocation_defaults() {
        let cli = Cli::parse_from(["spineskel", "hero.json"]);
        assert_eq!(cli.input, PathBuf::from("hero.json"));
        assert_eq!(cli.output, None);
        assert_eq!(cli.atlas, None);
        assert!(!cli.verbose);
    }

    #[test]
    fn output_defaults_to_input_with_skel_extension() {
        let cli = Cli::parse_from(["spineskel", "export/hero.json"]);
        assert_eq!(cli.output_path(), PathBuf::from("export/hero.skel"));

        // No extension to replace still gets one appended.
        assert_eq!(default_output(Path::new("hero")), PathBuf::from("hero.skel"));
    }

    #[test]
    fn explicit_output_wins_over_the_default() {
        let cli = Cli::parse_from(["spineskel", "hero.json", "--output", "out/hero.bin"]);
        assert_eq!(cli.output_path(), PathBuf::from("out/hero.bin"));
    }

    #[test]
    fn atlas_and_verbose_flags_parse() {
        let cli = Cli::parse_from([
            "spineskel",
            "hero.json",
            "--atlas",
            "hero.atlas",
            "--verbose",
        ]);
        assert_eq!(cli.atlas.as_deref(), Some(Path::new("hero.atlas")));
        assert!(cli.verbose);

        let cli = Cli::parse_from(["spineskel", "hero.json", "-a", "hero.atlas", "-v"]);
        assert_eq!(cli.atlas.as_deref(), Some(Path::new("hero.atlas")));
        assert!(cli.verbose);
    }

    #[test]
    fn missing_input_is_rejected() {
        assert!(Cli::try_parse_from(["spineskel"]).is_err());
    }
}
