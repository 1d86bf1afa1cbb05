// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `liftd` and `cab` binaries
//! and drive them over loopback TCP and shared memory.

use std::time::Duration;

use cab::call::CallReply;
use liftcore::floor::Floor;
use liftcore::shm::SharedBlock;
use liftcore::state::Status;
use serial_test::serial;

use lift_specs::{Car, Controller, Safety};

const SETTLE: Duration = Duration::from_secs(10);
const TICK: Duration = Duration::from_secs(3);

fn assigned(name: &str) -> CallReply {
    CallReply::Assigned(name.to_owned())
}

fn floor(label: &str) -> Floor {
    label.parse().unwrap()
}

/// Car names embed the test process id so parallel test runs cannot collide
/// on shared memory names.
fn car_name(tag: &str) -> String {
    format!("{tag}{}", std::process::id())
}

#[tokio::test]
#[serial]
async fn basic_call_rides_to_destination() -> anyhow::Result<()> {
    let controller = Controller::start()?;
    let name = car_name("Alpha");
    let car = Car::start(&name, "1", "4", 10, &controller.addr)?;

    assert!(controller.call_until("1", "2", &assigned(&name), SETTLE).await);

    assert!(car.eventually(SETTLE, |raw| {
        raw.decode_current() == Some(floor("2"))
            && raw.decode_destination() == Some(floor("2"))
            && raw.decode_status() == Some(Status::Closed)
    }));
    Ok(())
}

#[tokio::test]
#[serial]
async fn out_of_range_call_is_refused() -> anyhow::Result<()> {
    let controller = Controller::start()?;
    let name = car_name("Beta");
    let _car = Car::start(&name, "B3", "1", 10, &controller.addr)?;

    // The car serves B3..1 only; make sure it is registered first.
    assert!(controller.call_until("B2", "1", &assigned(&name), SETTLE).await);
    assert_eq!(controller.call("1", "3").await?, CallReply::Unavailable);
    Ok(())
}

#[tokio::test]
#[serial]
async fn service_mode_withdraws_and_returns() -> anyhow::Result<()> {
    let controller = Controller::start()?;
    let name = car_name("Gamma");
    let car = Car::start(&name, "1", "4", 10, &controller.addr)?;
    assert!(controller.call_until("1", "2", &assigned(&name), SETTLE).await);
    assert!(car.eventually(SETTLE, |raw| {
        raw.decode_current() == Some(floor("2")) && raw.decode_status() == Some(Status::Closed)
    }));

    assert!(lift_specs::internal(&name, "service_on")?.success());
    assert!(controller.call_until("1", "2", &CallReply::Unavailable, SETTLE).await);

    assert!(lift_specs::internal(&name, "service_off")?.success());
    assert!(controller.call_until("1", "2", &assigned(&name), SETTLE).await);
    Ok(())
}

#[tokio::test]
#[serial]
async fn manual_movement_in_service_mode() -> anyhow::Result<()> {
    let controller = Controller::start()?;
    let name = car_name("Delta");
    let car = Car::start(&name, "1", "4", 10, &controller.addr)?;

    assert!(lift_specs::internal(&name, "service_on")?.success());
    assert!(lift_specs::internal(&name, "up")?.success());
    assert!(car.eventually(SETTLE, |raw| {
        raw.decode_current() == Some(floor("2")) && raw.decode_status() == Some(Status::Closed)
    }));
    assert!(lift_specs::internal(&name, "down")?.success());
    assert!(car.eventually(SETTLE, |raw| raw.decode_current() == Some(floor("1"))));
    Ok(())
}

#[tokio::test]
#[serial]
async fn obstruction_reopens_closing_doors() -> anyhow::Result<()> {
    // No car process: the test owns the block and plays the car itself, so
    // the Closing phase holds still while the monitor reacts.
    let name = car_name("Obst");
    let block = SharedBlock::create(&name)?;
    let safety = Safety::start(&name)?;

    {
        let mut guard = block.lock();
        guard.set_status(Status::Closing);
        guard.set_door_obstruction(true);
        guard.broadcast();
    }

    assert!(lift_specs::eventually(TICK, || {
        block.raw().decode_status() == Some(Status::Opening)
    }));
    assert_eq!(block.raw().emergency_mode, 0);
    drop(safety);
    Ok(())
}

#[tokio::test]
#[serial]
async fn corrupted_block_forces_emergency() -> anyhow::Result<()> {
    let name = car_name("Corrupt");
    let block = SharedBlock::create(&name)?;
    let safety = Safety::start(&name)?;

    {
        let mut guard = block.lock();
        guard.set_status_label("Asdfghj");
        guard.broadcast();
    }

    assert!(lift_specs::eventually(TICK, || block.raw().emergency_mode == 1));

    let output = safety.stop_and_read_output()?;
    assert_eq!(output.matches("Data consistency error!").count(), 1, "output: {output:?}");
    Ok(())
}

#[tokio::test]
#[serial]
async fn emergency_stop_reports_once_and_withdraws_car() -> anyhow::Result<()> {
    let controller = Controller::start()?;
    let name = car_name("Estop");
    let car = Car::start(&name, "1", "4", 10, &controller.addr)?;
    let safety = Safety::start(&name)?;
    assert!(controller.call_until("1", "2", &assigned(&name), SETTLE).await);

    assert!(lift_specs::internal(&name, "stop")?.success());
    assert!(car.eventually(TICK, |raw| raw.emergency_mode == 1));

    // The car has left controller service.
    assert!(controller.call_until("1", "2", &CallReply::Unavailable, SETTLE).await);

    // Pressing again re-latches but does not re-report.
    assert!(lift_specs::internal(&name, "stop")?.success());
    tokio::time::sleep(Duration::from_millis(300)).await;
    let output = safety.stop_and_read_output()?;
    assert_eq!(
        output.matches("The emergency stop button has been pressed!").count(),
        1,
        "output: {output:?}"
    );
    Ok(())
}

#[tokio::test]
#[serial]
async fn first_registered_eligible_car_serves() -> anyhow::Result<()> {
    let controller = Controller::start()?;
    let low_name = car_name("Low");
    let tall_name = car_name("Tall");
    let _low = Car::start(&low_name, "1", "2", 10, &controller.addr)?;
    assert!(controller.call_until("1", "2", &assigned(&low_name), SETTLE).await);
    let _tall = Car::start(&tall_name, "1", "9", 10, &controller.addr)?;
    assert!(controller.call_until("1", "9", &assigned(&tall_name), SETTLE).await);

    // Both are eligible for this ride; registration order decides.
    assert_eq!(controller.call("1", "2").await?, assigned(&low_name));
    Ok(())
}
