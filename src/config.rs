//! Scheduler construction parameters.

use crate::error::{Error, Result};
use std::env::{self, VarError};

/// Default number of thread slots.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default usable stack size for each uthread (128KB)
pub const DEFAULT_STACK_SIZE: usize = 128 * 1024;

/// Smallest stack a uthread may be given (16KB)
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Largest stack a uthread may be given (1GB)
pub const MAX_STACK_SIZE: usize = 1024 * 1024 * 1024;

const CAPACITY_VAR: &str = "UTHREAD_CAPACITY";
const STACK_SIZE_VAR: &str = "UTHREAD_STACK_SIZE";

/// Fixed sizes of a scheduler, chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of slots in the thread table.
    pub capacity: usize,
    /// Usable bytes of each private stack. Bounds the worst-case call depth
    /// of every entry closure; exceeding it kills the process.
    pub stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capacity: DEFAULT_CAPACITY,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl Config {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Defaults overridden by `UTHREAD_CAPACITY` and `UTHREAD_STACK_SIZE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name))
    }

    /// Defaults overridden by whatever `lookup` returns for the
    /// `UTHREAD_*` names.
    fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Result<String, VarError>,
    {
        let mut config = Config::default();
        if let Some(capacity) = read_var(&lookup, CAPACITY_VAR)? {
            config.capacity = capacity;
        }
        if let Some(stack_size) = read_var(&lookup, STACK_SIZE_VAR)? {
            config.stack_size = stack_size;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "stack size {} is below the minimum of {MIN_STACK_SIZE} bytes",
                self.stack_size
            )));
        }
        if self.stack_size > MAX_STACK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "stack size {} is above the maximum of {MAX_STACK_SIZE} bytes",
                self.stack_size
            )));
        }
        Ok(())
    }
}

fn read_var<L>(lookup: &L, name: &str) -> Result<Option<usize>>
where
    L: Fn(&str) -> Result<String, VarError>,
{
    match lookup(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("{name}={value:?}: {e}"))),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::InvalidConfig(format!("{name}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.stack_size, 128 * 1024);
    }

    #[test]
    fn builder_overrides() {
        let config = Config::default().with_capacity(4).with_stack_size(32 * 1024);
        assert_eq!(
            config,
            Config {
                capacity: 4,
                stack_size: 32 * 1024
            }
        );
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = Config::default().with_capacity(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn tiny_stack_rejected() {
        let err = Config::default()
            .with_stack_size(MIN_STACK_SIZE - 1)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("below the minimum"));
    }

    #[test]
    fn huge_stack_rejected() {
        for size in [MAX_STACK_SIZE + 1, usize::MAX] {
            let err = Config::default().with_stack_size(size).validate().unwrap_err();
            assert!(err.to_string().contains("above the maximum"), "size {size}");
        }
        assert!(Config::default().with_stack_size(MAX_STACK_SIZE).validate().is_ok());
    }

    fn lookup_from<'a>(
        vars: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn lookup_without_vars_gives_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars = [("UTHREAD_CAPACITY", " 8 "), ("UTHREAD_STACK_SIZE", "65536")];
        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(
            config,
            Config {
                capacity: 8,
                stack_size: 65536
            }
        );
    }

    #[test]
    fn unparsable_var_rejected() {
        let vars = [("UTHREAD_CAPACITY", "lots")];
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("UTHREAD_CAPACITY")));
    }

    #[test]
    fn non_unicode_var_rejected() {
        let err = Config::from_lookup(|name| {
            if name == STACK_SIZE_VAR {
                Err(VarError::NotUnicode("\u{fffd}".into()))
            } else {
                Err(VarError::NotPresent)
            }
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("UTHREAD_STACK_SIZE")));
    }

    #[test]
    fn env_values_are_validated() {
        let vars = [("UTHREAD_STACK_SIZE", "18446744073709551615")];
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(err.to_string().contains("above the maximum"));
    }

    #[test]
    fn from_env_reads_process_environment() {
        // Only this test touches the UTHREAD_* variables.
        unsafe {
            env::set_var(CAPACITY_VAR, "3");
            env::remove_var(STACK_SIZE_VAR);
        }
        let config = Config::from_env();
        unsafe {
            env::remove_var(CAPACITY_VAR);
        }
        let config = config.unwrap();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
    }
}
