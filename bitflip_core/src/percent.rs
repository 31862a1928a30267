use crate::flip::ReadWriteSeek;
use crate::offset::OffsetSpec;
use crate::spray::{FileInfo, FlipFn, SprayError, SprayPattern, SprayPatternFactory};
use crate::units::{ibytes, si};
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Flips a percentage of a file's bits at uniformly random locations.
///
/// Locations are drawn with replacement, so a bit picked twice ends up unflipped.
/// Percentages above 100 and below 0 are taken as given: the former flip more times
/// than the file has bits, the latter flip nothing.
#[derive(Debug)]
pub struct PercentSpray {
    rng: ChaCha8Rng,
    percent: f64,
    file: FileInfo,
}

impl PercentSpray {
    /// Pattern type under which this spray is registered.
    pub const KIND: &'static str = "percent";

    pub fn new(file: FileInfo, percent: f64, rng: ChaCha8Rng) -> Self {
        Self { rng, percent, file }
    }

    /// Parses the argument of a `percent:<float>` descriptor.
    pub fn factory(args: &str) -> Result<SprayPatternFactory, SprayError> {
        let percent = args
            .parse::<f64>()
            .map_err(|source| SprayError::InvalidPercent {
                input: args.to_string(),
                source,
            })?;
        Ok(SprayPatternFactory::new(Self::KIND, move |file, rng| {
            Box::new(PercentSpray::new(file.clone(), percent, rng))
        }))
    }

    fn total_bits(&self) -> u64 {
        self.file.size.saturating_mul(8)
    }

    /// Number of flips a spray performs: `floor(size * 8 * percent / 100)`, never negative.
    ///
    /// NaN percentages flip nothing.
    pub fn flip_count(&self) -> u64 {
        let wanted = (self.total_bits() as f64 * self.percent / 100.0).floor();
        // Float to int casts saturate and map NaN to 0.
        wanted as u64
    }
}

impl SprayPattern for PercentSpray {
    fn spray(
        &mut self,
        stream: &mut dyn ReadWriteSeek,
        flip: &mut FlipFn<'_>,
    ) -> Result<(), SprayError> {
        let to_flip = self.flip_count();
        info!(
            "randomly flipping {} out of {} ({}% of {}) in file {:?}",
            si(to_flip as f64, "bits"),
            si(self.total_bits() as f64, "bits"),
            self.percent,
            ibytes(self.file.size),
            self.file.name,
        );

        for index in 0..to_flip {
            let Some(target) = OffsetSpec::random(&mut self.rng, self.file.size) else {
                // Empty file with a positive flip count cannot happen: 0 bits yield 0 flips.
                break;
            };
            flip(&mut *stream, target.byte_offset(), target.bit_offset())
                .map_err(|source| SprayError::Flip { index, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flip::{FlipError, flip_bit_at_offset};
    use crate::spray::parse_spray_pattern;
    use rand_core::SeedableRng;
    use std::io::{self, Cursor};

    fn spray_with(size: u64, percent: f64, seed: u64) -> PercentSpray {
        PercentSpray::new(
            FileInfo::new("test.bin", size),
            percent,
            ChaCha8Rng::seed_from_u64(seed),
        )
    }

    /// Runs `sprayer` over `data` with the real flip primitive, counting the calls.
    fn run_counting(sprayer: &mut dyn SprayPattern, data: Vec<u8>) -> (Vec<u8>, u64) {
        let mut stream = Cursor::new(data);
        let mut calls = 0u64;
        sprayer
            .spray(&mut stream, &mut |s: &mut dyn ReadWriteSeek, byte, bit| {
                calls += 1;
                flip_bit_at_offset(s, byte, bit)
            })
            .expect("spray over an in-memory buffer should succeed");
        (stream.into_inner(), calls)
    }

    #[test]
    fn flip_count_is_floor_of_percentage_of_bits() {
        let cases = [
            (100u64, 11.5f64, 92u64),
            (100, 100.0, 800),
            (100, 250.0, 2000),
            (3, 10.0, 2),
            (1, 12.4, 0),
            (1, 12.5, 1),
            (1024, 0.1, 8),
            (0, 50.0, 0),
        ];
        for (size, percent, want) in cases {
            assert_eq!(
                spray_with(size, percent, 0).flip_count(),
                want,
                "size {} percent {}",
                size,
                percent
            );
        }
    }

    #[test]
    fn negative_and_nan_percentages_flip_nothing() {
        assert_eq!(spray_with(100, -5.0, 0).flip_count(), 0);
        assert_eq!(spray_with(100, f64::NAN, 0).flip_count(), 0);
    }

    #[test]
    fn performs_exactly_flip_count_flips() {
        for (size, percent) in [(64u64, 11.5f64), (10, 100.0), (7, 300.0), (1, 50.0)] {
            let mut sprayer = spray_with(size, percent, size);
            let want = sprayer.flip_count();
            let (_, calls) = run_counting(&mut sprayer, vec![0u8; size as usize]);
            assert_eq!(calls, want, "size {} percent {}", size, percent);
        }
    }

    #[test]
    fn zero_percent_leaves_file_unchanged() {
        let original: Vec<u8> = (0..=255).collect();
        let mut sprayer = spray_with(original.len() as u64, 0.0, 3);
        let (sprayed, calls) = run_counting(&mut sprayer, original.clone());
        assert_eq!(calls, 0);
        assert_eq!(sprayed, original);
    }

    #[test]
    fn flips_land_inside_the_file() {
        let size = 5u64;
        let mut sprayer = spray_with(size, 400.0, 11);
        let mut stream = Cursor::new(vec![0u8; size as usize]);
        sprayer
            .spray(&mut stream, &mut |_s: &mut dyn ReadWriteSeek, byte, bit| {
                assert!(byte < size, "byte {} outside a {} byte file", byte, size);
                assert!(bit <= 7, "bit {} outside a byte", bit);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn changed_bits_match_parity_of_flips() {
        let mut sprayer = spray_with(32, 50.0, 5);
        let (sprayed, calls) = run_counting(&mut sprayer, vec![0u8; 32]);
        let ones: u64 = sprayed.iter().map(|b| u64::from(b.count_ones())).sum();
        assert_eq!(calls, 128);
        assert!(ones <= calls);
        // Each repeated pick cancels a previous flip in pairs.
        assert_eq!(ones % 2, calls % 2);
    }

    #[test]
    fn same_seed_gives_same_corruption() {
        let data = vec![0xA5u8; 64];
        let (first, _) = run_counting(&mut spray_with(64, 20.0, 99), data.clone());
        let (second, _) = run_counting(&mut spray_with(64, 20.0, 99), data.clone());
        let (other, _) = run_counting(&mut spray_with(64, 20.0, 100), data.clone());
        assert_eq!(first, second);
        assert_ne!(first, data);
        assert_ne!(first, other);
    }

    #[test]
    fn failing_flip_aborts_with_its_index() {
        let mut sprayer = spray_with(16, 100.0, 1);
        let mut stream = Cursor::new(vec![0u8; 16]);
        let mut calls = 0u64;
        let err = sprayer
            .spray(&mut stream, &mut |_s: &mut dyn ReadWriteSeek, _byte, _bit| {
                calls += 1;
                if calls == 3 {
                    Err(FlipError::Write(io::Error::other("disk on fire")))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(calls, 3, "no flips after the failing one");
        match &err {
            SprayError::Flip { index, source } => {
                assert_eq!(*index, 2);
                assert!(matches!(source, FlipError::Write(_)));
            }
            other => panic!("expected a flip error, got {:?}", other),
        }
        assert!(err.to_string().contains("flip number 2"), "got {}", err);
    }

    #[test]
    fn stream_shorter_than_reported_size_fails_on_read() {
        // File info claims more bytes than the stream holds.
        let mut sprayer = spray_with(1024, 100.0, 8);
        let mut stream = Cursor::new(vec![0u8; 1]);
        let err = sprayer
            .spray(&mut stream, &mut |s: &mut dyn ReadWriteSeek, byte, bit| {
                flip_bit_at_offset(s, byte, bit)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            SprayError::Flip {
                source: FlipError::Read(_),
                ..
            }
        ));
    }

    #[test]
    fn registry_factory_binds_to_file() {
        let factory = parse_spray_pattern("percent:25").unwrap();
        let mut sprayer =
            factory.build_with_rng(&FileInfo::new("x", 8), ChaCha8Rng::seed_from_u64(4));
        let (_, calls) = run_counting(sprayer.as_mut(), vec![0u8; 8]);
        assert_eq!(calls, 16);
    }

    #[test]
    fn unseeded_factory_build_still_counts_exactly() {
        let factory = parse_spray_pattern("percent:12.5").unwrap();
        let mut sprayer = factory.build(&FileInfo::new("y", 10));
        let (_, calls) = run_counting(sprayer.as_mut(), vec![0u8; 10]);
        assert_eq!(calls, 10);
    }
}
