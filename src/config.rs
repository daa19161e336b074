use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::job::{HashMethod, JobDescription, PathResolver};

/// Pipeline configuration (loaded from `regen.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegenConfig {
    #[serde(default)]
    pub state: StateConfig,

    /// Jobs in the order they run
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,
}

/// Where records and scratch directories live, and how inputs are hashed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State directory, relative to the project root
    #[serde(default = "default_state_dir")]
    pub dir: String,

    #[serde(default)]
    pub hash: HashMethod,

    /// Program used as `<shell> -c <command>`
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            hash: HashMethod::default(),
            shell: default_shell(),
        }
    }
}

/// One `[[job]]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobConfig {
    pub label: String,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    /// Opaque cache-busting value
    #[serde(default)]
    pub value: Option<String>,

    /// Patterns whose matched path list (not contents) is folded into the value
    #[serde(default)]
    pub value_paths: Vec<String>,

    pub command: String,

    /// Deadline for the command (e.g., "30s", "5m")
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl JobConfig {
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout.as_deref().map(parse_duration).transpose()
    }

    /// Freeze this table into a job description
    pub fn description(&self, resolver: &dyn PathResolver, root: &Path) -> Result<JobDescription> {
        Ok(JobDescription::new(
            self.label.clone(),
            self.inputs.clone(),
            self.outputs.clone(),
            self.extra_value(resolver, root)?,
        )?)
    }

    /// The job's `value`, extended with a digest of `value_paths`
    ///
    /// `value_paths` are expanded here so that adding or removing a matching
    /// file changes the value even though file contents are not hashed.
    pub fn extra_value(&self, resolver: &dyn PathResolver, root: &Path) -> Result<String> {
        let mut value = self.value.clone().unwrap_or_default();

        if !self.value_paths.is_empty() {
            let paths = resolver
                .resolve(&self.value_paths)
                .with_context(|| format!("Failed to expand value_paths for job '{}'", self.label))?;

            let mut hasher = Sha256::new();
            for path in &paths {
                let rel = path.strip_prefix(root).unwrap_or(path);
                hasher.update(rel.to_string_lossy().as_bytes());
                hasher.update([0u8]);
            }
            if !value.is_empty() {
                value.push(':');
            }
            value.push_str(&hex::encode(hasher.finalize()));
        }

        Ok(value)
    }
}

fn default_state_dir() -> String {
    ".regen".to_string()
}

fn default_shell() -> String {
    "sh".to_string()
}

impl RegenConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: RegenConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Reject declarations that can't run safely, before any job starts
    pub fn validate(&self) -> Result<()> {
        if self.state.dir.is_empty() {
            anyhow::bail!("state.dir must be set");
        }

        if self.state.shell.is_empty() {
            anyhow::bail!("state.shell must be set");
        }

        let mut labels = HashSet::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for job in &self.jobs {
            if job.label.is_empty() {
                anyhow::bail!("job.label must be set");
            }

            if !labels.insert(job.label.as_str()) {
                anyhow::bail!("job.label must be unique: {}", job.label);
            }

            if job.outputs.is_empty() {
                anyhow::bail!("job '{}' must declare at least one output", job.label);
            }

            if job.command.trim().is_empty() {
                anyhow::bail!("job '{}' must declare a command", job.label);
            }

            job.timeout()
                .with_context(|| format!("job '{}' has an invalid timeout", job.label))?;

            // Concurrent or sequential, two jobs writing one file share a record key
            for output in &job.outputs {
                if let Some(owner) = owners.insert(output.as_str(), job.label.as_str()) {
                    anyhow::bail!(
                        "output '{}' is declared by both '{}' and '{}'",
                        output,
                        owner,
                        job.label
                    );
                }
            }
        }

        Ok(())
    }

    /// Absolute state directory for a project root
    pub fn state_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.state.dir)
    }

    /// Generate example configuration as TOML string
    pub fn example() -> Result<String> {
        let config = RegenConfig {
            state: StateConfig::default(),
            jobs: vec![
                JobConfig {
                    label: "injected".to_string(),
                    inputs: vec![
                        "src/templates/injected.ts.tmpl".to_string(),
                        "src/injected/**/*.ts".to_string(),
                    ],
                    outputs: vec!["src/generated/injected.ts".to_string()],
                    command: "node scripts/bundle-injected.mjs".to_string(),
                    timeout: Some("5m".to_string()),
                    ..Default::default()
                },
                JobConfig {
                    label: "version".to_string(),
                    inputs: vec![
                        "package.json".to_string(),
                        "src/templates/version.ts.tmpl".to_string(),
                    ],
                    outputs: vec!["src/generated/version.ts".to_string()],
                    command: "node scripts/stamp-version.mjs".to_string(),
                    ..Default::default()
                },
            ],
        };

        toml::to_string_pretty(&config).context("Failed to serialize example configuration")
    }
}

/// Parse a duration like "30s", "5m", "2h" or "1d"
pub fn parse_duration(s: &str) -> Result<Duration> {
    if s.is_empty() {
        return Err(anyhow!("Empty duration string"));
    }

    let (unit_start, unit) = s
        .char_indices()
        .last()
        .ok_or_else(|| anyhow!("Invalid duration: {}", s))?;
    let num: u64 = s[..unit_start]
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {}", s))?;

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return Err(anyhow!("Invalid duration unit: {}. Use: s, m, h, d", unit)),
    };

    let seconds = num
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow!("Invalid duration: {}", s))?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::GlobResolver;
    use tempfile::TempDir;

    fn job(label: &str, outputs: &[&str]) -> JobConfig {
        JobConfig {
            label: label.to_string(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            command: "true".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = RegenConfig::default();
        assert_eq!(config.state.dir, ".regen");
        assert_eq!(config.state.shell, "sh");
        assert_eq!(config.state.hash, HashMethod::Content);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[state]
hash = "mtime"

[[job]]
label = "types"
outputs = ["src/types.ts"]
value_paths = ["src/*.ts"]
command = "node scripts/types.mjs"
timeout = "30s"
env = { NODE_ENV = "production" }

[[job]]
label = "version"
inputs = ["package.json"]
outputs = ["src/generated/version.ts"]
command = "node scripts/version.mjs"
"#;
        let config: RegenConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.state.hash, HashMethod::Mtime);
        assert_eq!(config.state.dir, ".regen");
        assert_eq!(config.jobs.len(), 2);
        assert_eq!(config.jobs[0].label, "types");
        assert_eq!(
            config.jobs[0].timeout().unwrap(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.jobs[0].env["NODE_ENV"], "production");
        assert_eq!(config.jobs[1].inputs, vec!["package.json"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_round_trips() {
        let config: RegenConfig = toml::from_str(&RegenConfig::example().unwrap()).unwrap();
        assert_eq!(config.jobs.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_job_without_outputs_rejected() {
        let config = RegenConfig {
            jobs: vec![job("types", &[])],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one output"));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let config = RegenConfig {
            jobs: vec![job("types", &["a.ts"]), job("types", &["b.ts"])],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlapping_outputs_rejected() {
        let config = RegenConfig {
            jobs: vec![job("one", &["src/types.ts"]), job("two", &["src/types.ts"])],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("declared by both"));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let mut bad = job("types", &["src/types.ts"]);
        bad.timeout = Some("5w".to_string());
        let config = RegenConfig {
            jobs: vec![bad],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5µ").is_err());
        assert!(parse_duration("µ").is_err());
        assert!(parse_duration("999999999999999999d").is_err());
    }

    #[test]
    fn test_overflowing_timeout_rejected() {
        let mut slow = job("types", &["src/types.ts"]);
        slow.timeout = Some("999999999999999999d".to_string());
        let config = RegenConfig {
            jobs: vec![slow],
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("invalid timeout"));
    }

    #[test]
    fn test_value_paths_track_file_set() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/common")).unwrap();
        fs::write(temp.path().join("src/common/a.ts"), "a").unwrap();
        let resolver = GlobResolver::new(temp.path());

        let mut types = job("types", &["src/types.ts"]);
        types.value_paths = vec!["src/common/*.ts".to_string()];

        let before = types.description(&resolver, temp.path()).unwrap();

        // Content changes do not matter, only the path list does
        fs::write(temp.path().join("src/common/a.ts"), "changed").unwrap();
        let same = types.description(&resolver, temp.path()).unwrap();
        assert_eq!(before.extra_value(), same.extra_value());

        fs::write(temp.path().join("src/common/b.ts"), "b").unwrap();
        let after = types.description(&resolver, temp.path()).unwrap();
        assert_ne!(before.extra_value(), after.extra_value());
    }

    #[test]
    fn test_value_combined_with_value_paths() {
        let temp = TempDir::new().unwrap();
        let resolver = GlobResolver::new(temp.path());

        let mut types = job("types", &["src/types.ts"]);
        types.value = Some("v2".to_string());
        types.value_paths = vec!["src/*.ts".to_string()];

        let description = types.description(&resolver, temp.path()).unwrap();
        assert!(description.extra_value().starts_with("v2:"));
    }
}
