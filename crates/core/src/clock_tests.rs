// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let start_ms = clock.epoch_ms();
    let start = clock.now();

    clock.advance(Duration::from_millis(1500));

    assert_eq!(clock.epoch_ms(), start_ms + 1500);
    assert_eq!(clock.now(), start + Duration::from_millis(1500));
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn epoch_day_buckets_by_day() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(0);
    assert_eq!(clock.epoch_day(), 0);

    clock.set_epoch_ms(DAY_MS - 1);
    assert_eq!(clock.epoch_day(), 0);

    clock.set_epoch_ms(DAY_MS);
    assert_eq!(clock.epoch_day(), 1);

    clock.set_epoch_ms(3 * DAY_MS + 12_000);
    assert_eq!(clock.epoch_day(), 3);
}

#[test]
fn system_clock_epoch_is_sane() {
    let clock = SystemClock;
    // After 2020-01-01 and monotonically consistent with epoch_day.
    assert!(clock.epoch_ms() > 1_577_836_800_000);
    assert_eq!(clock.epoch_day(), (clock.epoch_ms() / DAY_MS) as u32);
}
