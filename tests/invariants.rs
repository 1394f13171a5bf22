//! Randomized operation sequences against the scheduler's laws.
//!
//! Every sequence is checked after each step with
//! [`Scheduler::check_invariants`] and against the previous snapshot:
//! history counters never go down, levels and demotion counts only move on
//! a tick or an explicit `set_priority`, and the boost and demotion rules
//! fire exactly when they should.

use mlfq_sched::config::SchedConfig;
use mlfq_sched::proc::{ProcState, WaitChannel};
use mlfq_sched::scheduler::Scheduler;
use mlfq_sched::snapshot::{PStat, ProcStat};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Spawn,
    Tick,
    Schedule,
    Yield,
    Sleep(u8),
    Wakeup(u8),
    Exit,
    Reap(usize),
    SetPriority(usize, i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Spawn),
        8 => Just(Op::Tick),
        3 => Just(Op::Schedule),
        1 => Just(Op::Yield),
        2 => (0u8..4).prop_map(Op::Sleep),
        2 => (0u8..4).prop_map(Op::Wakeup),
        1 => Just(Op::Exit),
        1 => any::<usize>().prop_map(Op::Reap),
        1 => (any::<usize>(), -1i32..4).prop_map(|(i, l)| Op::SetPriority(i, l)),
    ]
}

fn live(snap: &PStat) -> Vec<&ProcStat> {
    snap.procs.iter().filter(|p| p.inuse != 0).collect()
}

fn pick(snap: &PStat, index: usize) -> Option<i32> {
    let procs = live(snap);
    if procs.is_empty() {
        None
    } else {
        Some(procs[index % procs.len()].pid)
    }
}

fn is_schedulable(p: &ProcStat) -> bool {
    p.state == ProcState::Runnable.code() || p.state == ProcState::Running.code()
}

fn apply(s: &mut Scheduler, op: &Op, before: &PStat) {
    match *op {
        Op::Spawn => {
            let _ = s.spawn("prop", 1);
        }
        Op::Tick => {
            if s.tick() {
                s.schedule();
            }
        }
        Op::Schedule => {
            s.schedule();
        }
        Op::Yield => {
            let _ = s.yield_current();
        }
        Op::Sleep(chan) => {
            let _ = s.sleep_current(WaitChannel(chan as usize));
        }
        Op::Wakeup(chan) => {
            s.wakeup(WaitChannel(chan as usize));
        }
        Op::Exit => {
            let _ = s.exit_current();
        }
        Op::Reap(i) => {
            if let Some(pid) = pick(before, i) {
                let _ = s.reap(pid);
            }
        }
        Op::SetPriority(i, level) => {
            let pid = pick(before, i).unwrap_or(-1);
            let result = s.set_priority(pid, level);
            if !(0..3).contains(&level) {
                assert!(result.is_err());
            }
        }
    }
}

fn check_step(op: &Op, before: &PStat, after: &PStat, boost_interval: u64) {
    let sys = &after.sys;
    assert!(sys.global_ticks >= before.sys.global_ticks);
    assert_eq!(
        sys.queue_count.iter().sum::<i32>(),
        sys.runnable_count + sys.running_count
    );
    assert!(sys.running_count <= 1);
    assert!(sys.next_boost_in >= 0 && sys.next_boost_in as u64 <= boost_interval);

    let boosted_now = matches!(op, Op::Tick) && sys.last_boost_tick == sys.global_ticks;

    for p in live(after) {
        assert!((0..3).contains(&p.priority));
        assert_eq!(p.time_slice, 1 << p.priority);
        if is_schedulable(p) {
            assert!(p.ticks_current < p.time_slice);
        }

        let Some(old) = before.find(p.pid) else {
            // Newly created processes start at the top with clean history.
            assert_eq!(p.priority, 0);
            assert_eq!((p.num_demoted, p.num_boosted, p.ticks_total), (0, 0, 0));
            continue;
        };

        assert!(p.ticks_total >= old.ticks_total);
        assert!(p.num_scheduled >= old.num_scheduled);
        assert!(p.num_demoted >= old.num_demoted);
        assert!(p.num_boosted >= old.num_boosted);

        match op {
            Op::Tick => {}
            Op::SetPriority(..) => {
                assert_eq!(p.num_demoted, old.num_demoted);
                assert_eq!(p.num_boosted, old.num_boosted);
            }
            _ => {
                assert_eq!(p.priority, old.priority, "pid {} moved on {:?}", p.pid, op);
                assert_eq!(p.num_demoted, old.num_demoted);
                assert_eq!(p.num_boosted, old.num_boosted);
            }
        }

        if boosted_now && is_schedulable(old) && old.priority > 0 {
            assert_eq!(p.priority, 0, "pid {} missed the boost", p.pid);
            assert_eq!(p.num_boosted, old.num_boosted + 1);
        }

        // The process that held the CPU across this tick.
        let ran = matches!(op, Op::Tick) && old.state == ProcState::Running.code();
        if ran && !(boosted_now && old.priority > 0) {
            assert_eq!(p.ticks_total, old.ticks_total + 1);
            if old.ticks_current + 1 == old.time_slice {
                let expected = (old.priority + 1).min(2);
                assert_eq!(p.priority, expected);
                assert_eq!(
                    p.num_demoted,
                    old.num_demoted + i32::from(old.priority < 2)
                );
            } else if !boosted_now {
                assert_eq!(p.priority, old.priority);
                assert_eq!(p.num_demoted, old.num_demoted);
            }
        }
    }
}

fn run_sequence(boost_interval: u64, ops: &[Op]) {
    let mut s = Scheduler::with_config(SchedConfig::with_boost_interval(boost_interval)).unwrap();
    s.spawn("init", 0).unwrap();
    let mut before = s.snapshot();

    for op in ops {
        apply(&mut s, op, &before);
        s.check_invariants();
        let after = s.snapshot();
        check_step(op, &before, &after, boost_interval);
        before = after;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_sequences_keep_invariants(
        boost_interval in 1u64..40,
        ops in prop::collection::vec(op_strategy(), 1..300),
    ) {
        run_sequence(boost_interval, &ops);
    }

    #[test]
    fn names_survive_capture(name in "[a-z_]{0,32}") {
        let mut s = Scheduler::default();
        let pid = s.spawn(&name, 0).unwrap();
        let snap = s.snapshot();
        let stored = snap.find(pid).unwrap().name();
        prop_assert!(stored.len() <= 15);
        prop_assert!(name.starts_with(stored));
    }
}

#[test]
fn table_fills_and_drains() {
    let mut s = Scheduler::default();
    let mut pids = Vec::new();
    while let Ok(pid) = s.spawn("filler", 0) {
        pids.push(pid);
    }
    assert_eq!(pids.len(), mlfq_sched::config::NPROC);
    assert_eq!(s.snapshot().sys.total_processes, pids.len() as i32);

    while let Some(pid) = s.schedule() {
        s.exit_current().unwrap();
        s.reap(pid).unwrap();
    }
    s.check_invariants();
    let snap = s.snapshot();
    assert_eq!(snap.sys.total_processes, 0);
    assert!(snap.procs.iter().all(|p| *p == ProcStat::EMPTY));

    // Pids keep counting after slots are recycled.
    let again = s.spawn("again", 0).unwrap();
    assert!(again > *pids.last().unwrap());
}
