use crate::imports::*;

/// Specialized code to execute upon initialization, e.g. sorting and validation after
/// deserialization
pub trait Init {
    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// File and string round trips of data-contract types, running [Init::init] on the way in
/// unless `skip_init` is set
pub trait SerdeAPI: Serialize + for<'a> Deserialize<'a> + Init {
    const ACCEPTED_BYTE_FORMATS: &'static [&'static str] = &["yaml", "json", "bin"];

    /// Write (serialize) an object to a file, truncating any existing one.
    /// The format follows the extension, one of [`ACCEPTED_BYTE_FORMATS`](`SerdeAPI::ACCEPTED_BYTE_FORMATS`).
    fn to_file<P: AsRef<Path>>(&self, filepath: P) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        match file_format(filepath)?.as_str() {
            "yaml" | "yml" => serde_yaml::to_writer(&File::create(filepath)?, self)?,
            "json" => serde_json::to_writer(&File::create(filepath)?, self)?,
            "bin" => bincode::serialize_into(&File::create(filepath)?, self)?,
            other => bail!(
                "Unsupported format {other:?}, must be one of {:?}",
                Self::ACCEPTED_BYTE_FORMATS
            ),
        }
        Ok(())
    }

    /// Read (deserialize) an object from a file written by [SerdeAPI::to_file]
    fn from_file<P: AsRef<Path>>(filepath: P, skip_init: bool) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let format = file_format(filepath)?;
        let file = File::open(filepath).with_context(|| {
            if !filepath.exists() {
                format!("File not found: {filepath:?}")
            } else {
                format!("Could not open file: {filepath:?}")
            }
        })?;
        let mut deserialized: Self = match format.as_str() {
            "yaml" | "yml" => serde_yaml::from_reader(file)?,
            "json" => serde_json::from_reader(file)?,
            "bin" => bincode::deserialize_from(file)?,
            other => bail!(
                "Unsupported format {other:?}, must be one of {:?}",
                Self::ACCEPTED_BYTE_FORMATS
            ),
        };
        if !skip_init {
            deserialized.init()?;
        }
        Ok(deserialized)
    }

    fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self)?)
    }

    fn from_json<S: AsRef<str>>(json_str: S, skip_init: bool) -> anyhow::Result<Self> {
        let mut json_de: Self = serde_json::from_str(json_str.as_ref())?;
        if !skip_init {
            json_de.init()?;
        }
        Ok(json_de)
    }

    fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(&self)?)
    }

    fn from_yaml<S: AsRef<str>>(yaml_str: S, skip_init: bool) -> anyhow::Result<Self> {
        let mut yaml_de: Self = serde_yaml::from_str(yaml_str.as_ref())?;
        if !skip_init {
            yaml_de.init()?;
        }
        Ok(yaml_de)
    }
}

/// Lowercase extension of `filepath`
fn file_format(filepath: &Path) -> anyhow::Result<String> {
    Ok(filepath
        .extension()
        .and_then(OsStr::to_str)
        .with_context(|| format!("File extension could not be parsed: {filepath:?}"))?
        .to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(SimulationConfig::default().to_file(&path).is_err());
        assert!(SimulationConfig::from_file(&path, false).is_err());
        assert!(SimulationConfig::from_file(dir.path().join("missing.yaml"), false).is_err());
    }

    #[test]
    fn test_yml_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.YML");
        let config = SimulationConfig::default();
        config.to_file(&path).unwrap();
        assert_eq!(SimulationConfig::from_file(&path, false).unwrap(), config);
    }
}
