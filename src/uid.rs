/*
 *  uid.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unique identifier generator service
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::HashSet;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Process-unique id service. Owned by the Driver and handed out by
/// reference; the mutex makes individual draws safe from any thread.
pub struct UidGenerator {
    inner: Mutex<Inner>,
}

struct Inner {
    rng: StdRng,
    issued: HashSet<u32>,
}

impl UidGenerator {
    pub fn new(seed: u64) -> Self {
        UidGenerator {
            inner: Mutex::new(Inner {
                rng: StdRng::seed_from_u64(seed),
                issued: HashSet::new(),
            }),
        }
    }

    /// Draw an id that has not been issued before by this generator.
    /// Zero is reserved as a never-issued sentinel.
    pub fn unique_id(&self) -> u32 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            let id: u32 = inner.rng.random();
            if id != 0 && inner.issued.insert(id) {
                return id;
            }
        }
    }

    pub fn issued_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.issued.len()
    }
}
