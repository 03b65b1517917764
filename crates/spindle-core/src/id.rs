//! Opaque identifier generation
//!
//! `IdGenerator` produces integers that are unique within a run but hard to
//! guess from their predecessors. Each output byte has its own additive
//! counter ("lane") advancing by a step picked at construction. Steps are odd,
//! so every lane cycles through all 256 byte values before repeating. Lanes
//! carry into each other like an odometer: lane `k + 1` advances whenever lane
//! `k` returns to its starting value. The resulting sequence visits every value
//! of the integer type exactly once per period of `256^width`.
//!
//! Not suitable for cryptographic purposes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;

/// Smallest step a lane may use (1 would make the lane sequential)
const MIN_STEP: u8 = 3;

/// Largest step a lane may use (255 is a decrement by one)
const MAX_STEP: u8 = 253;

/// Integer types an `IdGenerator` can produce
pub trait IdValue: Copy + Send + 'static {
    /// Width of the type in bytes
    const WIDTH: usize;

    /// Assemble a value from `WIDTH` little-endian bytes
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_id_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IdValue for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..Self::WIDTH]);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_id_value!(u8, u16, u32, u64, u128);

/// One additive byte sequence
#[derive(Debug, Clone, Copy)]
struct Lane {
    start: u8,
    value: u8,
    step: u8,
}

/// Generator of unique, non-sequential identifiers
#[derive(Debug, Clone)]
pub struct IdGenerator<T: IdValue> {
    lanes: Vec<Lane>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: IdValue> IdGenerator<T> {
    /// Create a generator with randomly chosen lane steps
    pub fn new() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }

    /// Create a reproducible generator from a seed
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(&mut StdRng::seed_from_u64(seed))
    }

    fn with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let lanes = (0..T::WIDTH)
            .map(|_| {
                let start: u8 = rng.gen();
                let step = rng.gen_range(MIN_STEP..=MAX_STEP) | 1;
                Lane {
                    start,
                    value: start,
                    step,
                }
            })
            .collect();

        Self {
            lanes,
            _marker: PhantomData,
        }
    }

    /// Produce the next identifier
    pub fn next_id(&mut self) -> T {
        let mut bytes = [0u8; 16];
        for (byte, lane) in bytes.iter_mut().zip(&self.lanes) {
            *byte = lane.value;
        }
        self.advance();
        T::from_le_slice(&bytes[..T::WIDTH])
    }

    /// Width of the produced identifiers in bytes
    pub fn width(&self) -> usize {
        T::WIDTH
    }

    fn advance(&mut self) {
        for lane in &mut self.lanes {
            lane.value = lane.value.wrapping_add(lane.step);
            if lane.value != lane.start {
                break;
            }
        }
    }
}

impl<T: IdValue> Default for IdGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IdValue> Iterator for IdGenerator<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        Some(self.next_id())
    }
}
