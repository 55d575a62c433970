//! Seeded Randomness
//!
//! Idle walks, damage rolls, spawn positions and random tints all draw
//! from the one generator held by the game state. Seeding it the same way
//! and feeding the same chat replays a stream exactly.

/// Xorshift128+ generator.
///
/// ```
/// use live_quest::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(7);
/// let mut b = DeterministicRng::new(7);
/// assert_eq!(a.next_int(100), b.next_int(100));
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    s0: u64,
    s1: u64,
}

impl DeterministicRng {
    /// Generator for `seed`. Any seed is fine, zero included.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let s0 = splitmix64(&mut sm);
        let s1 = splitmix64(&mut sm);
        if s0 | s1 == 0 {
            return Self { s0: 1, s1: 1 };
        }
        Self { s0, s1 }
    }

    /// Raw 64 bits.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let (s0, mut s1) = (self.s0, self.s1);
        let out = s0.wrapping_add(s1);
        s1 ^= s0;
        self.s0 = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.s1 = s1.rotate_left(37);
        out
    }

    /// Uniform in `0..max`; 0 when `max` is 0.
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        match max {
            0 => 0,
            m => (self.next_u64() % u64::from(m)) as u32,
        }
    }

    /// Color channel in `0..max`.
    #[inline]
    pub fn next_byte(&mut self, max: u8) -> u8 {
        self.next_int(u32::from(max)) as u8
    }

    /// Uniform in `[0, max)`; 0 for non-positive `max`.
    pub fn next_f64(&mut self, max: f64) -> f64 {
        if max <= 0.0 {
            return 0.0;
        }
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        unit * max
    }
}

// SplitMix64 step, spreads low-entropy seeds over both state words.
fn splitmix64(x: &mut u64) -> u64 {
    *x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
