//! Chronologically sortable record keys.
//!
//! A key is 8 characters of millisecond timestamp followed by 12 random
//! characters, drawn from an alphabet in ASCII order. Keys generated within
//! the same millisecond increment the random part, so lexicographic order of
//! keys equals generation order.

use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Generator for push keys
#[derive(Debug, Clone, Default)]
pub struct PushIdGenerator {
    last_time: i64,
    last_rand: [u8; 12],
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next key for the current wall-clock time
    pub fn generate(&mut self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        self.generate_at(now, &mut rand::thread_rng())
    }

    /// Next key for `now_ms`. A clock that moves backwards is clamped to the
    /// last seen time so keys stay increasing.
    pub fn generate_at<R: Rng>(&mut self, now_ms: i64, rng: &mut R) -> String {
        let now = now_ms.max(self.last_time);
        if now == self.last_time && self.last_time != 0 {
            for digit in self.last_rand.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            for digit in self.last_rand.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
        }
        self.last_time = now;

        let mut id = String::with_capacity(20);
        let mut time = now;
        let mut time_chars = [0u8; 8];
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }
        id.extend(time_chars.iter().map(|&c| c as char));
        id.extend(self.last_rand.iter().map(|&d| PUSH_CHARS[d as usize] as char));
        id
    }
}
