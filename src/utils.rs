use crate::prelude::*;

/// Waits for `n_cycles` rising edges of `signal`.
pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> SimpleResult<()> {
    for _ in 0..n_cycles {
        signal.rising_edge().await?;
    }
    Ok(())
}

#[inline]
pub fn rand_byte() -> u8 {
    rand::random::<u8>()
}

