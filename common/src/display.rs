//! Idle animation shown while the appliance is powered off.

use rand::{rngs::StdRng, Rng};

const X_MIN: i32 = 1;
const X_MAX: i32 = 95;
const Y_MIN: i32 = 20;
const Y_MAX: i32 = 64;
const START: (i32, i32) = (55, 25);

/// The "Off" label drifting around the panel. Each step moves it by its
/// velocity; on reaching an edge it is pinned there and that axis gets a
/// fresh speed of 1..=3 pointing back inside.
#[derive(Debug, Clone)]
pub struct OffBounce {
    x: i32,
    y: i32,
    vx: i32,
    vy: i32,
    rng: StdRng,
}

impl OffBounce {
    pub fn new(mut rng: StdRng) -> Self {
        let vx = speed(&mut rng);
        let vy = speed(&mut rng);
        Self {
            x: START.0,
            y: START.1,
            vx,
            vy,
            rng,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn step(&mut self) {
        self.x += self.vx;
        self.y += self.vy;

        if self.x < X_MIN || self.x >= X_MAX {
            self.vx = speed(&mut self.rng);
            if self.x < X_MIN {
                self.x = X_MIN;
            } else {
                self.x = X_MAX;
                self.vx = -self.vx;
            }
        }

        if self.y <= Y_MIN || self.y >= Y_MAX {
            self.vy = speed(&mut self.rng);
            if self.y <= Y_MIN {
                self.y = Y_MIN;
            } else {
                self.y = Y_MAX;
                self.vy = -self.vy;
            }
        }
    }
}

fn speed(rng: &mut StdRng) -> i32 {
    rng.gen_range(1..=3)
}
