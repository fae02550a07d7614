use std::sync::atomic::AtomicBool;

use super::*;

#[derive(Default)]
struct Echo;

#[async_trait]
impl WorkerActor for Echo {
	type Cmd = u32;
	type Evt = u32;

	async fn handle(&mut self, cmd: u32, ctx: &mut ActorContext<u32>) -> Result<ActorFlow, String> {
		ctx.emit(cmd);
		if cmd == 0 { Ok(ActorFlow::Stop) } else { Ok(ActorFlow::Continue) }
	}
}

#[tokio::test]
async fn commands_are_handled_in_order_until_stop() {
	let handle = spawn_supervised_actor(ActorSpec::new("echo", TaskClass::Control, Echo::default));
	let mut events = handle.subscribe();
	for cmd in [3, 1, 2, 0] {
		handle.send(cmd).await.unwrap();
	}
	for expected in [3, 1, 2, 0] {
		assert_eq!(events.recv().await.ok(), Some(expected));
	}

	let report = handle.shutdown(ShutdownMode::Graceful { timeout: Duration::from_secs(1) }).await;
	assert!(report.completed);
	assert_eq!(report.last_exit, Some(ActorExit::Stopped));
}

struct Flaky {
	starts: Arc<AtomicUsize>,
	panic: bool,
}

#[async_trait]
impl WorkerActor for Flaky {
	type Cmd = ();
	type Evt = ();

	async fn on_start(&mut self, _ctx: &mut ActorContext<()>) -> Result<(), String> {
		self.starts.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn handle(&mut self, _cmd: (), _ctx: &mut ActorContext<()>) -> Result<ActorFlow, String> {
		if self.panic {
			panic!("container exploded");
		}
		Err("boom".to_string())
	}
}

fn flaky(starts: &Arc<AtomicUsize>, panic: bool, max_restarts: usize) -> ActorSpec<Flaky> {
	let starts = Arc::clone(starts);
	ActorSpec::new("flaky", TaskClass::Control, move || Flaky {
		starts: Arc::clone(&starts),
		panic,
	})
	.restart(RestartPolicy::OnFailure {
		max_restarts,
		backoff: Duration::from_millis(1),
	})
}

#[tokio::test(start_paused = true)]
async fn handler_failure_restarts_until_budget_is_spent() {
	let starts = Arc::new(AtomicUsize::new(0));
	let handle = spawn_supervised_actor(flaky(&starts, false, 2));
	for _ in 0..3 {
		handle.send(()).await.unwrap();
	}
	tokio::time::sleep(Duration::from_millis(100)).await;

	assert_eq!(starts.load(Ordering::SeqCst), 3);
	assert_eq!(handle.restart_count(), 2);
	assert_eq!(handle.generation(), 3);
	assert_eq!(handle.last_exit(), Some(ActorExit::HandlerFailed("boom".to_string())));

	let report = handle.shutdown(ShutdownMode::Immediate).await;
	assert!(report.completed);
}

#[tokio::test(start_paused = true)]
async fn panic_restarts_like_an_error() {
	let starts = Arc::new(AtomicUsize::new(0));
	let handle = spawn_supervised_actor(flaky(&starts, true, 1));
	handle.send(()).await.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;

	assert_eq!(starts.load(Ordering::SeqCst), 2);
	assert_eq!(handle.restart_count(), 1);
	let _ = handle.shutdown(ShutdownMode::Immediate).await;
}

#[tokio::test(start_paused = true)]
async fn never_policy_does_not_restart() {
	let starts = Arc::new(AtomicUsize::new(0));
	let handle = spawn_supervised_actor(flaky(&starts, false, 5).restart(RestartPolicy::Never));
	handle.send(()).await.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;

	assert_eq!(starts.load(Ordering::SeqCst), 1);
	assert_eq!(handle.restart_count(), 0);
	let report = handle.shutdown(ShutdownMode::Graceful { timeout: Duration::from_secs(1) }).await;
	assert!(report.completed);
	assert_eq!(report.last_exit, Some(ActorExit::HandlerFailed("boom".to_string())));
}

struct Sleeper {
	stopped: Arc<AtomicBool>,
}

#[async_trait]
impl WorkerActor for Sleeper {
	type Cmd = Duration;
	type Evt = &'static str;

	async fn handle(&mut self, nap: Duration, ctx: &mut ActorContext<&'static str>) -> Result<ActorFlow, String> {
		ctx.emit("entered");
		tokio::time::sleep(nap).await;
		Ok(ActorFlow::Continue)
	}

	async fn on_stop(&mut self, _ctx: &mut ActorContext<&'static str>) {
		self.stopped.store(true, Ordering::SeqCst);
	}
}

fn sleeper(stopped: &Arc<AtomicBool>) -> ActorSpec<Sleeper> {
	let stopped = Arc::clone(stopped);
	ActorSpec::new("sleeper", TaskClass::Control, move || Sleeper {
		stopped: Arc::clone(&stopped),
	})
	.restart(RestartPolicy::Never)
}

#[tokio::test(start_paused = true)]
async fn immediate_shutdown_preempts_a_long_handler() {
	let stopped = Arc::new(AtomicBool::new(false));
	let handle = spawn_supervised_actor(sleeper(&stopped));
	let mut events = handle.subscribe();
	handle.send(Duration::from_secs(3600)).await.unwrap();
	assert_eq!(events.recv().await.ok(), Some("entered"));

	let started = tokio::time::Instant::now();
	let report = handle.shutdown(ShutdownMode::Immediate).await;
	assert!(started.elapsed() < Duration::from_secs(1));
	assert!(report.completed);
	assert_eq!(report.last_exit, Some(ActorExit::Cancelled));
	assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn graceful_timeout_escalates_to_force() {
	let stopped = Arc::new(AtomicBool::new(false));
	let handle = spawn_supervised_actor(sleeper(&stopped));
	let mut events = handle.subscribe();
	handle.send(Duration::from_secs(3600)).await.unwrap();
	assert_eq!(events.recv().await.ok(), Some("entered"));

	let graceful = handle.shutdown(ShutdownMode::Graceful { timeout: Duration::from_millis(20) }).await;
	assert!(graceful.timed_out());

	let forced = handle.shutdown_graceful_or_force(Duration::from_millis(20)).await;
	assert!(forced.completed);
	assert_eq!(forced.last_exit, Some(ActorExit::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn graceful_shutdown_drains_queued_commands() {
	let stopped = Arc::new(AtomicBool::new(false));
	let handle = spawn_supervised_actor(sleeper(&stopped));
	let mut events = handle.subscribe();
	for _ in 0..3 {
		handle.send(Duration::from_millis(10)).await.unwrap();
	}

	let report = handle.shutdown(ShutdownMode::Graceful { timeout: Duration::from_secs(1) }).await;
	assert!(report.completed);
	assert_eq!(report.last_exit, Some(ActorExit::MailboxClosed));
	let mut entered = 0;
	while events.try_recv().is_ok() {
		entered += 1;
	}
	assert_eq!(entered, 3);
}

#[tokio::test]
async fn cancel_makes_sends_fail_fast() {
	let handle = spawn_supervised_actor(ActorSpec::new("echo", TaskClass::Control, Echo::default).capacity(1));
	handle.cancel();
	assert_eq!(handle.send(1).await, Err(ActorSendError));
	let report = handle.shutdown(ShutdownMode::Immediate).await;
	assert!(report.completed);
}

#[tokio::test]
async fn concurrent_shutdowns_both_complete() {
	let handle = Arc::new(spawn_supervised_actor(ActorSpec::new("echo", TaskClass::Control, Echo::default)));
	let other = Arc::clone(&handle);
	let second = tokio::spawn(async move { other.shutdown(ShutdownMode::Immediate).await.completed });
	let first = handle.shutdown(ShutdownMode::Immediate).await;
	assert!(first.completed);
	assert!(second.await.unwrap());
}
