//! # Systems and Scheduling
//!
//! Systems run once per step in ascending priority; ties keep registration
//! order. Startup routines run once, before the first step's systems.

use std::fmt;

use super::context::Context;
use super::resource::LocalResources;

/// A unit of per-step logic.
pub trait System: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs the system. Structural changes go through `ctx`'s command buffer.
    fn run(&mut self, ctx: &mut Context<'_>);
}

/// A [`System`] backed by a closure.
pub struct FnSystem<F> {
    name: String,
    f: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut Context<'_>) + Send + 'static,
{
    /// Wraps `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut Context<'_>) + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &mut Context<'_>) {
        (self.f)(ctx);
    }
}

/// Handle returned by system registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u64);

/// A routine run exactly once, at the start of the next step.
pub type StartupFn = Box<dyn FnOnce(&mut Context<'_>) + Send>;

/// Phase of the step state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchedulerState {
    /// Between steps.
    #[default]
    Idle,
    /// Draining startup routines.
    RunningStartup,
    /// Running systems in priority order.
    RunningSystems,
    /// Advancing events and tidying storage.
    Committing,
}

pub(crate) struct SystemEntry {
    pub(crate) id: SystemId,
    pub(crate) priority: i32,
    pub(crate) system: Box<dyn System>,
    pub(crate) locals: LocalResources,
}

/// Ordered systems plus pending startup routines.
#[derive(Default)]
pub(crate) struct Schedule {
    systems: Vec<SystemEntry>,
    startup: Vec<StartupFn>,
    next_id: u64,
}

impl Schedule {
    pub(crate) fn add(&mut self, priority: i32, system: Box<dyn System>) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        let at = self.systems.partition_point(|entry| entry.priority <= priority);
        self.systems.insert(
            at,
            SystemEntry {
                id,
                priority,
                system,
                locals: LocalResources::default(),
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: SystemId) -> bool {
        let before = self.systems.len();
        self.systems.retain(|entry| entry.id != id);
        self.systems.len() != before
    }

    pub(crate) fn add_startup(&mut self, routine: StartupFn) {
        self.startup.push(routine);
    }

    pub(crate) fn take_startup(&mut self) -> Vec<StartupFn> {
        std::mem::take(&mut self.startup)
    }

    pub(crate) fn take_systems(&mut self) -> Vec<SystemEntry> {
        std::mem::take(&mut self.systems)
    }

    /// Puts systems back after a step.
    pub(crate) fn restore_systems(&mut self, systems: Vec<SystemEntry>) {
        self.systems = systems;
    }

    pub(crate) fn len(&self) -> usize {
        self.systems.len()
    }

    #[cfg(test)]
    pub(crate) fn startup_len(&self) -> usize {
        self.startup.len()
    }

    /// `(id, name, priority)` in execution order.
    pub(crate) fn describe(&self) -> Vec<(SystemId, String, i32)> {
        self.systems
            .iter()
            .map(|entry| (entry.id, entry.system.name().to_owned(), entry.priority))
            .collect()
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("systems", &self.describe())
            .field("startup", &self.startup.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &'static str) -> Box<dyn System> {
        Box::new(FnSystem::new(name, |_: &mut Context<'_>| {}))
    }

    fn order(schedule: &Schedule) -> Vec<String> {
        schedule.describe().into_iter().map(|(_, name, _)| name).collect()
    }

    #[test]
    fn test_priority_order_is_stable() {
        let mut schedule = Schedule::default();
        schedule.add(5, named("late"));
        schedule.add(0, named("a"));
        schedule.add(-3, named("early"));
        schedule.add(0, named("b"));
        schedule.add(5, named("later"));
        assert_eq!(order(&schedule), vec!["early", "a", "b", "late", "later"]);
    }

    #[test]
    fn test_remove_by_id() {
        let mut schedule = Schedule::default();
        let a = schedule.add(0, named("a"));
        schedule.add(0, named("b"));
        assert!(schedule.remove(a));
        assert!(!schedule.remove(a));
        assert_eq!(order(&schedule), vec!["b"]);
    }

    #[test]
    fn test_startup_drains() {
        let mut schedule = Schedule::default();
        schedule.add_startup(Box::new(|_: &mut Context<'_>| {}));
        schedule.add_startup(Box::new(|_: &mut Context<'_>| {}));
        assert_eq!(schedule.take_startup().len(), 2);
        assert_eq!(schedule.startup_len(), 0);
        assert!(schedule.take_startup().is_empty());
    }
}
