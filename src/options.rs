//! Configuration options for valuelog.

/// Number of levels in the value log.
///
/// Fixed by the manifest layout: the manifest reserves a slot for every
/// level, so this cannot be changed without a format migration.
pub const MAX_LEVELS: usize = 64;

/// Default per-file capacity before rotation (16MB).
pub const DEFAULT_FILE_CAPACITY: usize = 16 * 1024 * 1024;

/// Default maximum logical store size (16GB).
pub const DEFAULT_MAX_STORE_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Minimum allowed per-file capacity.
pub const MIN_FILE_CAPACITY: usize = 1024;

/// Value-log configuration options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Return an error if a store already exists at the path.
    pub error_if_exists: bool,

    /// Size at which the active file of a level is rotated.
    pub file_capacity: usize,

    /// Maximum logical store size. Compaction thresholds derive from this.
    pub max_store_size: u64,

    /// Optional extension appended to value file names.
    pub file_extension: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            file_capacity: DEFAULT_FILE_CAPACITY,
            max_store_size: DEFAULT_MAX_STORE_SIZE,
            file_extension: None,
        }
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.file_capacity < MIN_FILE_CAPACITY {
            return Err(crate::Error::InvalidConfiguration(format!(
                "file_capacity must be at least {} bytes",
                MIN_FILE_CAPACITY
            )));
        }

        if self.file_capacity > u32::MAX as usize {
            return Err(crate::Error::InvalidConfiguration(
                "file_capacity must fit in a 32-bit offset".into(),
            ));
        }

        if self.max_store_size < self.file_capacity as u64 {
            return Err(crate::Error::InvalidConfiguration(
                "max_store_size must be at least file_capacity".into(),
            ));
        }

        if let Some(ref ext) = self.file_extension {
            if ext.is_empty() || ext.contains('/') || ext.contains('.') {
                return Err(crate::Error::InvalidConfiguration(
                    "file_extension must be a bare suffix".into(),
                ));
            }
        }

        Ok(())
    }

    /// Size at which a background compaction is started.
    pub fn high_water_mark(&self) -> u64 {
        self.max_store_size / 10 * 8
    }

    /// Size below which a running compaction stops.
    pub fn low_water_mark(&self) -> u64 {
        self.max_store_size / 10 * 6
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set create_if_missing.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.options.create_if_missing = value;
        self
    }

    /// Set error_if_exists.
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.options.error_if_exists = value;
        self
    }

    /// Set the per-file rotation capacity.
    pub fn file_capacity(mut self, size: usize) -> Self {
        self.options.file_capacity = size;
        self
    }

    /// Set the maximum logical store size.
    pub fn max_store_size(mut self, size: u64) -> Self {
        self.options.max_store_size = size;
        self
    }

    /// Set the value file extension.
    pub fn file_extension(mut self, ext: impl Into<String>) -> Self {
        self.options.file_extension = Some(ext.into());
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}
