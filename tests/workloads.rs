//! Workload scenarios driven by a deterministic tick simulator.
//!
//! Each simulated process follows a script: CPU-bound jobs burn whole ticks
//! until their budget is spent, I/O-bound jobs do a sliver of work and then
//! block for a fixed number of ticks. The simulator plays the part of the
//! trap handler and the sleep/exit collaborators around the scheduler.

use mlfq_sched::config::SchedConfig;
use mlfq_sched::proc::{Pid, ProcState, QueueLevel, WaitChannel};
use mlfq_sched::scheduler::Scheduler;
use mlfq_sched::snapshot::PStat;

#[derive(Debug, Clone, Copy)]
enum Work {
    /// Needs `left` more ticks of CPU, never blocks.
    Cpu { left: u32 },
    /// `bursts` rounds of "tiny work, then sleep `nap` ticks".
    Io { bursts: u32, nap: u64 },
}

struct Sim {
    sched: Scheduler,
    jobs: Vec<(Pid, Work)>,
    sleeping: Vec<(Pid, u64)>,
    exits: Vec<(Pid, u64)>,
}

impl Sim {
    fn new(boost_interval: u64) -> Self {
        Self {
            sched: Scheduler::with_config(SchedConfig::with_boost_interval(boost_interval))
                .unwrap(),
            jobs: Vec::new(),
            sleeping: Vec::new(),
            exits: Vec::new(),
        }
    }

    fn add(&mut self, name: &str, work: Work) -> Pid {
        let pid = self.sched.spawn(name, 1).unwrap();
        self.jobs.push((pid, work));
        pid
    }

    fn work_mut(&mut self, pid: Pid) -> &mut Work {
        &mut self.jobs.iter_mut().find(|(p, _)| *p == pid).unwrap().1
    }

    fn now(&self) -> u64 {
        self.sched.global_ticks()
    }

    /// Let the running process act until one holds the CPU into the next
    /// tick, or nothing is runnable.
    fn settle(&mut self) {
        loop {
            let pid = match self.sched.current_pid() {
                Some(pid) => pid,
                None => match self.sched.schedule() {
                    Some(pid) => pid,
                    None => return,
                },
            };

            let now = self.now();
            match *self.work_mut(pid) {
                Work::Cpu { left: 0 } | Work::Io { bursts: 0, .. } => {
                    self.sched.exit_current().unwrap();
                    self.exits.push((pid, now));
                }
                Work::Cpu { .. } => return,
                Work::Io { bursts, nap } => {
                    *self.work_mut(pid) = Work::Io { bursts: bursts - 1, nap };
                    self.sched.sleep_current(WaitChannel(pid as usize)).unwrap();
                    self.sleeping.push((pid, now + nap));
                }
            }
        }
    }

    fn step(&mut self) {
        self.settle();

        let running = self.sched.current_pid();
        let must_yield = self.sched.tick();
        if let Some(pid) = running {
            if let Work::Cpu { left } = self.work_mut(pid) {
                *left -= 1;
            }
        }

        let now = self.now();
        let (due, rest): (Vec<_>, Vec<_>) =
            self.sleeping.iter().partition(|(_, wake_at)| *wake_at <= now);
        self.sleeping = rest;
        for (pid, _) in due {
            assert_eq!(self.sched.wakeup(WaitChannel(pid as usize)), 1);
        }

        if must_yield {
            self.sched.schedule();
        }
        self.sched.check_invariants();
    }

    fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    fn run_until_all_exit(&mut self, max_ticks: u64) {
        while self.exits.len() < self.jobs.len() {
            assert!(self.now() < max_ticks, "workload did not finish in {} ticks", max_ticks);
            self.step();
        }
    }

    fn exit_tick(&self, pid: Pid) -> u64 {
        self.exits.iter().find(|(p, _)| *p == pid).unwrap().1
    }

    fn snap(&self) -> PStat {
        self.sched.snapshot()
    }
}

#[test]
fn cpu_bound_sinks_to_lowest_queue() {
    let mut sim = Sim::new(1000);
    let hog = sim.add("cpu_bound", Work::Cpu { left: 500 });

    sim.run(3);
    let p = *sim.snap().find(hog).unwrap();
    assert_eq!(p.priority, 2);
    assert_eq!(p.num_demoted, 2);
    assert_eq!(p.ticks_total, 3);

    sim.run_until_all_exit(2000);
    let p = *sim.snap().find(hog).unwrap();
    assert_eq!(p.state, ProcState::Zombie.code());
    assert_eq!(p.priority, 2);
    assert!(p.num_demoted >= 2);
    assert_eq!(p.ticks_total, 500);
}

#[test]
fn io_bound_stays_at_top() {
    let mut sim = Sim::new(50);
    let io = sim.add("io_bound", Work::Io { bursts: 40, nap: 3 });
    // Background load so the I/O job always competes for the CPU.
    sim.add("background", Work::Cpu { left: 10_000 });

    sim.run(150);
    let p = *sim.snap().find(io).unwrap();
    assert_eq!(p.priority, 0);
    assert_eq!(p.num_demoted, 0);
    assert!(p.num_scheduled >= 10);

    sim.run_until_all_exit(20_000);
    let p = *sim.snap().find(io).unwrap();
    assert_eq!(p.priority, 0);
    assert_eq!(p.num_demoted, 0);
}

#[test]
fn io_bound_finishes_before_cpu_bound() {
    let mut sim = Sim::new(100);
    let cpu = sim.add("cpu_bound", Work::Cpu { left: 200 });
    let io = sim.add("io_bound", Work::Io { bursts: 20, nap: 2 });

    sim.run_until_all_exit(1000);
    assert!(
        sim.exit_tick(io) < sim.exit_tick(cpu),
        "io exited at {}, cpu at {}",
        sim.exit_tick(io),
        sim.exit_tick(cpu)
    );

    let snap = sim.snap();
    assert_eq!(snap.find(io).unwrap().num_demoted, 0);
    assert!(snap.find(cpu).unwrap().num_demoted >= 2);
}

#[test]
fn sleep_before_slice_end_preserves_level() {
    let mut sim = Sim::new(1000);
    let pid = sim.add("worker", Work::Cpu { left: 100 });
    sim.sched.set_priority(pid, 2).unwrap();
    sim.sched.schedule();
    sim.sched.tick();
    sim.sched.tick();

    let before = *sim.snap().find(pid).unwrap();
    assert_eq!(before.ticks_current, 2);

    sim.sched.sleep_current(WaitChannel(7)).unwrap();
    sim.sched.tick();
    sim.sched.wakeup(WaitChannel(7));

    let after = *sim.snap().find(pid).unwrap();
    assert_eq!(after.priority, before.priority);
    assert_eq!(after.num_demoted, before.num_demoted);
    assert_eq!(after.ticks_current, 0);
    assert_eq!(after.state, ProcState::Runnable.code());
}

#[test]
fn manual_override_does_not_count_as_demotion() {
    let mut sim = Sim::new(1000);
    let pid = sim.add("victim", Work::Cpu { left: 10 });
    assert_eq!(sim.snap().find(pid).unwrap().priority, 0);

    sim.sched.set_priority(pid, 1).unwrap();
    let p = *sim.snap().find(pid).unwrap();
    assert_eq!(p.priority, 1);
    assert_eq!(p.num_demoted, 0);
    assert_eq!(p.num_boosted, 0);
    assert_eq!(sim.snap().sys.queue_count, [0, 1, 0]);
}

#[test]
fn periodic_boost_lifts_everyone() {
    let mut sim = Sim::new(20);
    let a = sim.add("hog_a", Work::Cpu { left: 1000 });
    let b = sim.add("hog_b", Work::Cpu { left: 1000 });

    sim.run(19);
    let before = sim.snap();
    for pid in [a, b] {
        assert_eq!(before.find(pid).unwrap().priority, 2);
        assert_eq!(before.find(pid).unwrap().num_boosted, 0);
    }
    assert_eq!(before.sys.next_boost_in, 1);

    sim.run(1);
    let after = sim.snap();
    assert_eq!(after.sys.last_boost_tick, 20);
    assert_eq!(after.sys.next_boost_in, 20);
    for pid in [a, b] {
        let p = after.find(pid).unwrap();
        assert_eq!(p.priority, 0);
        assert_eq!(p.num_boosted, 1);
        assert_eq!(p.ticks_current, 0);
    }
    assert_eq!(after.sys.queue_count, [2, 0, 0]);

    // They sink again after the boost.
    sim.run(10);
    let later = sim.snap();
    for pid in [a, b] {
        assert_eq!(later.find(pid).unwrap().priority, 2);
        assert!(later.find(pid).unwrap().num_demoted >= 4);
    }
}

#[test]
fn demotion_sequence_matches_slices() {
    let mut sim = Sim::new(1000);
    let pid = sim.add("hog", Work::Cpu { left: 100 });

    let mut levels = Vec::new();
    for _ in 0..7 {
        sim.step();
        levels.push(sim.sched.lookup(pid).unwrap().level);
    }
    use QueueLevel as L;
    assert_eq!(
        levels,
        [L::MEDIUM, L::MEDIUM, L::LOW, L::LOW, L::LOW, L::LOW, L::LOW]
    );
    assert_eq!(sim.sched.lookup(pid).unwrap().num_demoted, 2);
}
