//! Kairos demo CLI
//!
//! Runs the charging-car scenario: a car alternates charging and driving,
//! and a driver interrupts the charge. The run is repeated with an event
//! log to confirm both runs are identical.
//!
//! # Example
//!
//! ```bash
//! # Defaults: interrupt at t=3, stop at t=15
//! kairos
//!
//! # Interrupt while the car is driving
//! RUST_LOG=kairos=debug kairos --interrupt-at 6
//! ```

use std::process::ExitCode;

use clap::Parser;
use kairos::{
    from_fn, logs_match, Context, Environment, Failure, KernelError, Process, ProcessRef,
    Resume, Step, Value, VirtualTime,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Charging-car simulation
#[derive(Parser, Debug, Clone)]
#[command(name = "kairos")]
#[command(version, about, long_about = None)]
struct Args {
    /// Stop the simulation at this time
    #[arg(long, default_value = "15")]
    until: u64,

    /// Time at which the driver interrupts the car
    #[arg(long, default_value = "3")]
    interrupt_at: u64,

    /// Ticks spent charging
    #[arg(long, default_value = "5")]
    charge: u64,

    /// Ticks spent driving
    #[arg(long, default_value = "2")]
    drive: u64,

    /// Stop the run if a process fails with nobody awaiting it
    #[arg(long)]
    abort_on_failure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Charging,
    Driving,
}

struct Car {
    phase: Phase,
    charge: u64,
    drive: u64,
}

impl Car {
    fn begin_charge(&mut self, ctx: &mut Context<'_>) -> Result<Step, Failure> {
        self.phase = Phase::Charging;
        info!(time = %ctx.now(), "start charging");
        Ok(Step::await_event(ctx.timeout(self.charge)?).interruptible())
    }

    fn begin_drive(&mut self, ctx: &mut Context<'_>) -> Result<Step, Failure> {
        self.phase = Phase::Driving;
        info!(time = %ctx.now(), "start driving");
        Ok(Step::await_event(ctx.timeout(self.drive)?))
    }
}

impl Process for Car {
    fn resume(&mut self, ctx: &mut Context<'_>, input: Resume) -> Result<Step, Failure> {
        match input {
            Resume::Start => self.begin_charge(ctx),
            Resume::Interrupted(interrupt) => {
                info!(time = %ctx.now(), %interrupt, "charging interrupted");
                self.begin_drive(ctx)
            }
            other => {
                other.into_value()?;
                match self.phase {
                    Phase::Charging => self.begin_drive(ctx),
                    Phase::Driving => self.begin_charge(ctx),
                }
            }
        }
    }
}

fn simulate(args: &Args) -> Result<Environment, KernelError> {
    let mut builder = Environment::builder().with_log();
    if args.abort_on_failure {
        builder = builder.abort_on_unhandled_failure();
    }
    let mut env = builder.build();

    let car: ProcessRef = env.process_named(
        "car",
        Car {
            phase: Phase::Charging,
            charge: args.charge,
            drive: args.drive,
        },
    );
    let interrupt_at = args.interrupt_at;
    env.process_named(
        "driver",
        from_fn(move |ctx, input| match input {
            Resume::Start => Ok(Step::await_event(ctx.timeout(interrupt_at)?)),
            other => {
                other.into_value()?;
                info!(time = %ctx.now(), "driver takes the car");
                car.interrupt(ctx, Some(Value::text("driver")))?;
                Ok(Step::done())
            }
        }),
    );

    let fired = env.run(Some(VirtualTime::new(args.until)))?;
    info!(fired, time = %env.now(), car = ?env.process_state(car.id()), "simulation stopped");
    Ok(env)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,kairos=info")),
        )
        .init();

    let args = Args::parse();
    info!(?args, "starting");

    let (first, second) = match (simulate(&args), simulate(&args)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "simulation aborted");
            return ExitCode::FAILURE;
        }
    };

    match (first.event_log(), second.event_log()) {
        (Some(a), Some(b)) if logs_match(a, b) => {
            info!(hash = %format!("{:016x}", a.log_hash()), entries = a.len(), "runs identical");
            ExitCode::SUCCESS
        }
        _ => {
            warn!("runs diverged");
            ExitCode::FAILURE
        }
    }
}
