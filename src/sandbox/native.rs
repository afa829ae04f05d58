//! In-process reference substrate
//!
//! A deterministic [`Substrate`] for demos and tests. Guest programs are
//! Rust closures registered under a name; "compiling" resolves program
//! bytes (a UTF-8 name) against the registry. Fuel charging, deadline
//! checking, and traps are modeled explicitly so every fault path of the
//! sandbox layer can be exercised without a real WASM engine.
//!
//! The deadline uses a virtual clock that guests advance via
//! [`GuestEnv::stall`], keeping timeout behavior fully deterministic.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use super::substrate::{CallOutcome, HostImports, ResourceBudget, Substrate, WireValue};
use crate::error::LoadError;
use crate::sim::action_flags;

/// Faults a native guest can raise mid-call.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestFault {
    OutOfFuel,
    DeadlineExceeded,
    Trap(String),
}

/// Execution environment handed to a native guest for one call.
pub struct GuestEnv<'a> {
    imports: &'a mut HostImports,
    fuel: u64,
    virtual_elapsed: Duration,
    deadline: Duration,
}

impl GuestEnv<'_> {
    /// Consume metered fuel; errors once the budget is gone.
    pub fn charge(&mut self, units: u64) -> Result<(), GuestFault> {
        if units > self.fuel {
            self.fuel = 0;
            return Err(GuestFault::OutOfFuel);
        }
        self.fuel -= units;
        Ok(())
    }

    /// Model an unmetered wait, the code path fuel cannot bound. Advances
    /// the virtual clock and errors past the wall-clock budget.
    pub fn stall(&mut self, duration: Duration) -> Result<(), GuestFault> {
        self.virtual_elapsed += duration;
        if self.virtual_elapsed > self.deadline {
            return Err(GuestFault::DeadlineExceeded);
        }
        Ok(())
    }

    pub fn send_actions(&mut self, flags: i32) {
        (self.imports.send_actions)(flags);
    }

    pub fn send_action(&mut self, ax: f32, ay: f32) {
        (self.imports.send_action)(ax, ay);
    }

    pub fn set_color(&mut self, r: f32, g: f32, b: f32) {
        (self.imports.set_color)(r, g, b);
    }
}

/// One guest entry point.
pub type GuestFn = Box<dyn FnMut(&mut GuestEnv, &[WireValue]) -> Result<(), GuestFault>>;

/// A native guest program. `None` entry points model programs missing a
/// required export.
pub struct GuestProgram {
    pub init: Option<GuestFn>,
    pub update: Option<GuestFn>,
}

type ProgramFactory = Rc<dyn Fn() -> GuestProgram>;

/// A resolved program, ready to instantiate.
pub struct NativeModule {
    factory: ProgramFactory,
}

/// A live guest: program state plus its bound host callbacks.
pub struct NativeInstance {
    program: GuestProgram,
    imports: HostImports,
}

/// Registry-backed substrate for in-process guests.
#[derive(Default)]
pub struct NativeSubstrate {
    programs: HashMap<String, ProgramFactory>,
}

impl NativeSubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A substrate preloaded with the demo bots (`rammer`, `orbiter`).
    pub fn with_demo_bots() -> Self {
        let mut substrate = Self::new();
        substrate.register("rammer", rammer);
        substrate.register("orbiter", orbiter);
        substrate
    }

    /// Register a guest program factory under a name.
    pub fn register(&mut self, name: &str, factory: impl Fn() -> GuestProgram + 'static) {
        self.programs.insert(name.to_string(), Rc::new(factory));
    }
}

impl Substrate for NativeSubstrate {
    type Module = NativeModule;
    type Instance = NativeInstance;

    fn compile(&self, bytes: &[u8]) -> Result<NativeModule, LoadError> {
        let name = std::str::from_utf8(bytes)
            .map_err(|_| LoadError::Malformed("program bytes are not UTF-8".to_string()))?;
        let factory = self
            .programs
            .get(name)
            .ok_or_else(|| LoadError::Malformed(format!("unknown program `{name}`")))?;
        Ok(NativeModule {
            factory: factory.clone(),
        })
    }

    fn instantiate(
        &self,
        module: &NativeModule,
        imports: HostImports,
    ) -> Result<NativeInstance, LoadError> {
        Ok(NativeInstance {
            program: (module.factory)(),
            imports,
        })
    }

    fn has_export(&self, instance: &NativeInstance, name: &str) -> bool {
        match name {
            "init" => instance.program.init.is_some(),
            "update" => instance.program.update.is_some(),
            _ => false,
        }
    }

    fn call(
        &self,
        instance: &mut NativeInstance,
        export: &str,
        args: &[WireValue],
        budget: &ResourceBudget,
    ) -> CallOutcome {
        let entry = match export {
            "init" => instance.program.init.as_mut(),
            "update" => instance.program.update.as_mut(),
            _ => None,
        };
        let Some(entry) = entry else {
            return CallOutcome::Trap(format!("unknown export `{export}`"));
        };

        let mut env = GuestEnv {
            imports: &mut instance.imports,
            fuel: budget.fuel,
            virtual_elapsed: Duration::ZERO,
            deadline: budget.timeout,
        };
        match entry(&mut env, args) {
            Ok(()) => CallOutcome::Completed,
            Err(GuestFault::OutOfFuel) => CallOutcome::FuelExhausted,
            Err(GuestFault::DeadlineExceeded) => CallOutcome::Timeout,
            Err(GuestFault::Trap(msg)) => CallOutcome::Trap(msg),
        }
    }
}

fn f32_arg(args: &[WireValue], index: usize) -> f32 {
    match args.get(index) {
        Some(WireValue::F32(f)) => *f,
        Some(WireValue::I32(i)) => *i as f32,
        None => 0.0,
    }
}

fn i32_arg(args: &[WireValue], index: usize) -> i32 {
    match args.get(index) {
        Some(WireValue::I32(i)) => *i,
        Some(WireValue::F32(f)) => *f as i32,
        None => 0,
    }
}

/// Continuous-protocol demo guest: accelerates straight at the nearest
/// visible body, full throttle.
fn rammer() -> GuestProgram {
    use std::cell::Cell;
    let max_accel = Rc::new(Cell::new(0.0f32));
    let stored = max_accel.clone();

    GuestProgram {
        init: Some(Box::new(move |env, args| {
            env.charge(5)?;
            // config_args: max_accel is field 3
            stored.set(f32_arg(args, 3));
            env.set_color(1.0, 0.0, 0.0);
            Ok(())
        })),
        update: Some(Box::new(move |env, args| {
            env.charge(10)?;
            // state_args: visible_count is field 4, nearest rel pos is 5/6
            if i32_arg(args, 4) == 0 {
                return Ok(());
            }
            let (dx, dy) = (f32_arg(args, 5), f32_arg(args, 6));
            let mag = (dx * dx + dy * dy).sqrt();
            if mag > 0.0 {
                let a = max_accel.get();
                env.send_action(dx / mag * a, dy / mag * a);
            }
            Ok(())
        })),
    }
}

/// Discrete-protocol demo guest: always thrusts, circles left, and takes a
/// shot every 30 ticks. Keeps a tick counter as persistent instance state.
fn orbiter() -> GuestProgram {
    let mut ticks: u64 = 0;
    GuestProgram {
        init: Some(Box::new(|env, _args| {
            env.charge(5)?;
            env.set_color(0.0, 0.56, 1.0);
            Ok(())
        })),
        update: Some(Box::new(move |env, _args| {
            env.charge(10)?;
            ticks += 1;
            let mut flags = action_flags::THRUST | action_flags::LEFT;
            if ticks % 30 == 0 {
                flags |= action_flags::SHOOT;
            }
            env.send_actions(flags);
            Ok(())
        })),
    }
}
