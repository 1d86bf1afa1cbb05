// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn healthy() -> RawState {
    RawState {
        current_floor: *b"1\0\0\0",
        destination_floor: *b"1\0\0\0",
        status: Status::Closed.to_padded(),
        open_button: 0,
        close_button: 0,
        door_obstruction: 0,
        overload: 0,
        emergency_stop: 0,
        individual_service_mode: 0,
        emergency_mode: 0,
    }
}

#[yare::parameterized(
    closed = { Status::Closed },
    opening = { Status::Opening },
    open = { Status::Open },
    closing = { Status::Closing },
    between = { Status::Between },
)]
fn status_padded_round_trip(status: Status) {
    assert_eq!(Status::from_padded(&status.to_padded()), Some(status));
    assert_eq!(status.as_str().parse::<Status>(), Ok(status));
}

#[test]
fn status_rejects_unknown_text() {
    assert!("Ajar".parse::<Status>().is_err());
    assert_eq!(Status::from_padded(b"Asdfghj\0"), None);
}

#[test]
fn healthy_state_validates() {
    assert_eq!(healthy().validate(), Ok(()));
}

#[test]
fn garbled_status_is_inconsistent() {
    let mut state = healthy();
    state.status = *b"Asdfghj\0";
    assert_eq!(state.validate(), Err(ConsistencyError::Status));
}

#[test]
fn garbled_floor_is_inconsistent() {
    let mut state = healthy();
    state.destination_floor = *b"xyz\0";
    assert_eq!(state.validate(), Err(ConsistencyError::Floor));
}

#[test]
fn non_binary_flag_is_inconsistent() {
    let mut state = healthy();
    state.overload = 7;
    assert_eq!(state.validate(), Err(ConsistencyError::FlagRange));
}

#[test]
fn obstruction_requires_moving_doors() {
    let mut state = healthy();
    state.door_obstruction = 1;
    assert_eq!(state.validate(), Err(ConsistencyError::Obstruction));

    state.status = Status::Closing.to_padded();
    assert_eq!(state.validate(), Ok(()));

    state.status = Status::Opening.to_padded();
    assert_eq!(state.validate(), Ok(()));

    state.status = Status::Between.to_padded();
    assert_eq!(state.validate(), Err(ConsistencyError::Obstruction));
}
