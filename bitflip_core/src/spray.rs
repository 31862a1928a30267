use crate::flip::{FlipError, ReadWriteSeek};
use crate::percent::PercentSpray;
use crate::rng::session_rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::Metadata;
use std::num::ParseFloatError;
use std::path::Path;
use thiserror::Error;

/// Separator between the pattern type and its arguments, as in `percent:11.5`.
const PATTERN_SEPARATOR: char = ':';

/// Errors from parsing a spray descriptor or running a spray.
#[derive(Error, Debug)]
pub enum SprayError {
    #[error("invalid pattern string, no ':' symbols found")]
    NoSeparator,

    #[error("invalid pattern string, too many ':' symbols found")]
    TooManySeparators,

    #[error("unknown spray pattern type: {0:?}")]
    UnknownPattern(String),

    #[error("invalid argument for `percent:` spray {input:?}: {source}")]
    InvalidPercent {
        input: String,
        #[source]
        source: ParseFloatError,
    },

    /// A flip failed part way through a spray. `index` is the 0-based flip number;
    /// the flips before it stay applied.
    #[error("spraying file with random bitflips (flip number {index}): {source}")]
    Flip {
        index: u64,
        #[source]
        source: FlipError,
    },
}

/// The single-bit flip primitive a spray drives, normally
/// [`flip_bit_at_offset`](crate::flip::flip_bit_at_offset).
pub type FlipFn<'a> = dyn FnMut(&mut dyn ReadWriteSeek, u64, u8) -> Result<(), FlipError> + 'a;

/// What a spray needs to know about its target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Takes the base name from `path` and the size from `metadata`.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let name = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned();
        Self::new(name, metadata.len())
    }
}

/// A randomized corruption strategy bound to one file.
pub trait SprayPattern {
    /// Applies the strategy to `stream`, calling `flip` once per bit flip.
    fn spray(&mut self, stream: &mut dyn ReadWriteSeek, flip: &mut FlipFn<'_>)
    -> Result<(), SprayError>;
}

type BuildFn = dyn Fn(&FileInfo, ChaCha8Rng) -> Box<dyn SprayPattern>;

/// A parsed spray descriptor that is not yet bound to a file.
pub struct SprayPatternFactory {
    kind: &'static str,
    build: Box<BuildFn>,
}

impl SprayPatternFactory {
    pub fn new<F>(kind: &'static str, build: F) -> Self
    where
        F: Fn(&FileInfo, ChaCha8Rng) -> Box<dyn SprayPattern> + 'static,
    {
        Self {
            kind,
            build: Box::new(build),
        }
    }

    /// The pattern type this factory was parsed from.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Binds the pattern to `file` with a freshly seeded random source.
    ///
    /// Use [`SprayPatternFactory::build_with_rng`] for reproducible runs; the `bitflip`
    /// binary always goes through it with the session generator.
    pub fn build(&self, file: &FileInfo) -> Box<dyn SprayPattern> {
        self.build_with_rng(file, session_rng(None))
    }

    /// Binds the pattern to `file` using the given random source.
    pub fn build_with_rng(&self, file: &FileInfo, rng: ChaCha8Rng) -> Box<dyn SprayPattern> {
        (self.build)(file, rng)
    }
}

impl fmt::Debug for SprayPatternFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SprayPatternFactory")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Turns the argument half of a descriptor into a factory.
pub type PatternConstructor = fn(&str) -> Result<SprayPatternFactory, SprayError>;

/// Maps spray pattern types to their constructors.
///
/// New pattern types are added with [`SprayRegistry::register`]; the default registry
/// knows `percent`.
#[derive(Debug, Clone)]
pub struct SprayRegistry {
    constructors: BTreeMap<&'static str, PatternConstructor>,
}

impl SprayRegistry {
    /// A registry with no pattern types.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registers `constructor` under `kind`, returning the constructor it replaced, if any.
    pub fn register(
        &mut self,
        kind: &'static str,
        constructor: PatternConstructor,
    ) -> Option<PatternConstructor> {
        self.constructors.insert(kind, constructor)
    }

    /// Registered pattern types, in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Parses a `<type>:<args>` descriptor.
    pub fn parse(&self, descriptor: &str) -> Result<SprayPatternFactory, SprayError> {
        let mut parts = descriptor.split(PATTERN_SEPARATOR);
        let (kind, args) = match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(args), None) => (kind, args),
            (_, _, Some(_)) => return Err(SprayError::TooManySeparators),
            _ => return Err(SprayError::NoSeparator),
        };

        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| SprayError::UnknownPattern(kind.to_string()))?;
        constructor(args)
    }
}

impl Default for SprayRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(PercentSpray::KIND, PercentSpray::factory);
        registry
    }
}

/// Parses a descriptor against the default registry.
pub fn parse_spray_pattern(descriptor: &str) -> Result<SprayPatternFactory, SprayError> {
    SprayRegistry::default().parse(descriptor)
}
