// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! ISAAC pseudo-random number generator.
//!
//! Every source of randomness in the renderer is an `IsaacRng` that
//! the caller hands in explicitly.  There is no process-wide
//! instance: each render worker owns one, seeded from the render's
//! master generator, so that a fixed seed and a fixed thread count
//! always produce the same image.
//!
//! The generator implements `rand::RngCore`, so the usual `rand`
//! helpers (`gen`, `gen_range`, `SliceRandom::choose`) work on it.

use rand::{Error, RngCore, SeedableRng};
use std::f64::consts::PI;

/// log2 of the state size.
pub const RANDSIZL: usize = 4;
/// Number of 32-bit words of state.
pub const RANDSIZ: usize = 1 << RANDSIZL;

const GOLDEN_RATIO: u32 = 0x9e37_79b9;
const INV_2_32: f64 = 1.0 / 4_294_967_296.0;

/// Bob Jenkins' ISAAC, 32-bit words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsaacRng {
    rsl: [u32; RANDSIZ],
    mem: [u32; RANDSIZ],
    a: u32,
    b: u32,
    c: u32,
    cnt: usize,
}

macro_rules! mix {
    ($a:ident, $b:ident, $c:ident, $d:ident, $e:ident, $f:ident, $g:ident, $h:ident) => {
        $a ^= $b << 11;
        $d = $d.wrapping_add($a);
        $b = $b.wrapping_add($c);
        $b ^= $c >> 2;
        $e = $e.wrapping_add($b);
        $c = $c.wrapping_add($d);
        $c ^= $d << 8;
        $f = $f.wrapping_add($c);
        $d = $d.wrapping_add($e);
        $d ^= $e >> 16;
        $g = $g.wrapping_add($d);
        $e = $e.wrapping_add($f);
        $e ^= $f << 10;
        $h = $h.wrapping_add($e);
        $f = $f.wrapping_add($g);
        $f ^= $g >> 4;
        $a = $a.wrapping_add($f);
        $g = $g.wrapping_add($h);
        $g ^= $h << 8;
        $b = $b.wrapping_add($g);
        $h = $h.wrapping_add($a);
        $h ^= $a >> 9;
        $c = $c.wrapping_add($h);
        $a = $a.wrapping_add($b);
    };
}

impl IsaacRng {
    /// A generator seeded with zero accumulators and an all-zero
    /// result buffer.  Deterministic, and mostly useful in tests.
    pub fn new() -> Self {
        let mut rng = IsaacRng {
            rsl: [0; RANDSIZ],
            mem: [0; RANDSIZ],
            a: 0,
            b: 0,
            c: 0,
            cnt: 0,
        };
        rng.seed(0, 0, 0, None);
        rng
    }

    /// Expands a single 64-bit seed into the accumulators and the
    /// result buffer.
    pub fn from_u64(seed: u64) -> Self {
        // splitmix64 keeps neighbouring seeds far apart.
        let mut state = seed;
        let mut next = || {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        };
        let mut buffer = [0u32; RANDSIZ];
        for pair in buffer.chunks_mut(2) {
            let v = next();
            pair[0] = v as u32;
            if pair.len() > 1 {
                pair[1] = (v >> 32) as u32;
            }
        }
        let abc = next();
        let mut rng = IsaacRng::new();
        rng.seed(abc as u32, (abc >> 32) as u32, next() as u32, Some(&buffer));
        rng
    }

    /// Seeds a fresh generator from the output of `master`.  Render
    /// workers get their generators this way.
    pub fn child(master: &mut IsaacRng) -> Self {
        let mut buffer = [0u32; RANDSIZ];
        for word in buffer.iter_mut() {
            *word = master.next_uint();
        }
        let (a, b, c) = (master.next_uint(), master.next_uint(), master.next_uint());
        let mut rng = IsaacRng::new();
        rng.seed(a, b, c, Some(&buffer));
        rng
    }

    /// Re-initializes the whole state.  `buffer` is copied into the
    /// result array (missing words are zero) before the standard
    /// initialization mixes it into memory.
    pub fn seed(&mut self, a: u32, b: u32, c: u32, buffer: Option<&[u32]>) {
        self.rsl = [0; RANDSIZ];
        if let Some(words) = buffer {
            for (dst, src) in self.rsl.iter_mut().zip(words.iter()) {
                *dst = *src;
            }
        }
        self.a = a;
        self.b = b;
        self.c = c;
        self.init();
    }

    fn init(&mut self) {
        let mut a = GOLDEN_RATIO;
        let mut b = GOLDEN_RATIO;
        let mut c = GOLDEN_RATIO;
        let mut d = GOLDEN_RATIO;
        let mut e = GOLDEN_RATIO;
        let mut f = GOLDEN_RATIO;
        let mut g = GOLDEN_RATIO;
        let mut h = GOLDEN_RATIO;

        for _ in 0..4 {
            mix!(a, b, c, d, e, f, g, h);
        }

        for pass in 0..2 {
            for i in (0..RANDSIZ).step_by(8) {
                let src = if pass == 0 { &self.rsl } else { &self.mem };
                a = a.wrapping_add(src[i]);
                b = b.wrapping_add(src[i + 1]);
                c = c.wrapping_add(src[i + 2]);
                d = d.wrapping_add(src[i + 3]);
                e = e.wrapping_add(src[i + 4]);
                f = f.wrapping_add(src[i + 5]);
                g = g.wrapping_add(src[i + 6]);
                h = h.wrapping_add(src[i + 7]);
                mix!(a, b, c, d, e, f, g, h);
                self.mem[i] = a;
                self.mem[i + 1] = b;
                self.mem[i + 2] = c;
                self.mem[i + 3] = d;
                self.mem[i + 4] = e;
                self.mem[i + 5] = f;
                self.mem[i + 6] = g;
                self.mem[i + 7] = h;
            }
        }

        self.isaac();
        self.cnt = RANDSIZ;
    }

    fn isaac(&mut self) {
        self.c = self.c.wrapping_add(1);
        self.b = self.b.wrapping_add(self.c);
        for i in 0..RANDSIZ {
            let x = self.mem[i];
            self.a = match i & 3 {
                0 => self.a ^ (self.a << 13),
                1 => self.a ^ (self.a >> 6),
                2 => self.a ^ (self.a << 2),
                _ => self.a ^ (self.a >> 16),
            };
            self.a = self.mem[(i + RANDSIZ / 2) & (RANDSIZ - 1)].wrapping_add(self.a);
            let y = self.mem[(x >> 2) as usize & (RANDSIZ - 1)]
                .wrapping_add(self.a)
                .wrapping_add(self.b);
            self.mem[i] = y;
            self.b = self.mem[(y >> (RANDSIZL + 2)) as usize & (RANDSIZ - 1)].wrapping_add(x);
            self.rsl[i] = self.b;
        }
    }

    /// The next raw 32-bit output.
    #[inline]
    pub fn next_uint(&mut self) -> u32 {
        if self.cnt == 0 {
            self.isaac();
            self.cnt = RANDSIZ;
        }
        self.cnt -= 1;
        self.rsl[self.cnt]
    }

    /// A value in `0..n`, or the raw output when `n` is zero.
    #[inline]
    pub fn next_up_to(&mut self, n: u32) -> u32 {
        if n == 0 {
            self.next_uint()
        } else {
            self.next_uint() % n
        }
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn next_f01(&mut self) -> f64 {
        f64::from(self.next_uint()) * INV_2_32
    }

    /// Uniform in `[-1, 1)`.
    #[inline]
    pub fn next_f11(&mut self) -> f64 {
        self.next_f01() * 2.0 - 1.0
    }

    /// Uniform in `[lo, hi)`.
    #[inline]
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f01() * (hi - lo)
    }

    /// One random bit.
    #[inline]
    pub fn next_bit(&mut self) -> bool {
        self.next_uint() & 1 == 1
    }

    /// A random angle in `[0, 2π)`.
    #[inline]
    pub fn next_angle(&mut self) -> f64 {
        self.next_f01() * 2.0 * PI
    }
}

impl Default for IsaacRng {
    fn default() -> Self {
        IsaacRng::new()
    }
}

impl RngCore for IsaacRng {
    fn next_u32(&mut self) -> u32 {
        self.next_uint()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_uint());
        let lo = u64::from(self.next_uint());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_uint().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for IsaacRng {
    type Seed = [u8; 32];

    fn from_seed(seed: Self::Seed) -> Self {
        let mut words = [0u32; 8];
        for (word, bytes) in words.iter_mut().zip(seed.chunks(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        let mut rng = IsaacRng::new();
        rng.seed(words[0], words[1], words[2], Some(&words[3..]));
        rng
    }
}
