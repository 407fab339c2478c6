//! Sync-engine behaviour against a scripted in-memory remote host.
//!
//! The fake executes the same command shapes the engine emits (heredoc
//! writes, `cat`, `mkdir -p`, `test -e`, glob loops) against an in-memory
//! tree, records every command, and can inject transport failures, delays
//! and mid-transfer writes.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use telesync_core::RemoteError;
use telesync_engine::{SyncEngine, SyncObserver, SyncState, SyncWorker};
use telesync_ssh::{CommandOutput, RemoteExec};

// ── Scripted remote ──────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeRemote {
    files: HashMap<String, String>,
    dirs: HashSet<String>,
    commands: Vec<String>,
    fail_with: Option<RemoteError>,
    exec_delay: Option<Duration>,
    /// Invoked once, just before the next content write is applied.
    on_write: Option<Box<dyn FnMut(&str) + Send>>,
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s[1..s.len() - 1].replace("'\\''", "'")
    } else {
        s.to_string()
    }
}

impl FakeRemote {
    fn apply_write(&mut self, rest: &str) -> CommandOutput {
        let (path_part, after) = rest.split_once(" << '").expect("heredoc header");
        let path = unquote(path_part);
        let (delim, body) = after.split_once("'\n").expect("heredoc delimiter");
        // Everything cat receives: the body minus the trailing sentinel.
        let content = body.strip_suffix(delim).expect("heredoc terminator");
        if let Some(mut cb) = self.on_write.take() {
            cb(&path);
        }
        self.files.insert(path, content.to_string());
        CommandOutput::ok("")
    }

    fn list_children(&self, dir: &str) -> String {
        let prefix = format!("{}/", dir);
        let mut names = BTreeSet::new();
        for key in self.files.keys().chain(self.dirs.iter()) {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if let Some(first) = rest.split('/').next() {
                    if !first.is_empty() {
                        names.insert(first.to_string());
                    }
                }
            }
        }
        names
            .into_iter()
            .map(|n| format!("{}\n", n))
            .collect::<String>()
    }

    fn apply_glob(&mut self, command: &str) -> CommandOutput {
        let inner = unquote(command.strip_prefix("bash -c ").expect("bash wrapper"));
        let rest = inner.strip_prefix("cd ").expect("cd prefix");
        let (root_part, tail) = rest.split_once(" && ").expect("glob shape");
        let root = unquote(root_part);
        let pattern = tail
            .split("for f in ")
            .nth(1)
            .and_then(|s| s.split(';').next())
            .expect("glob pattern")
            .trim();
        let matcher = glob::Pattern::new(pattern).expect("valid pattern");

        let prefix = format!("{}/", root);
        let mut keys: Vec<&String> = self.files.keys().collect();
        keys.sort();
        let mut out = String::new();
        for path in keys {
            if let Some(rel) = path.strip_prefix(&prefix) {
                if matcher.matches(rel) {
                    out.push_str(rel);
                    out.push('\n');
                }
            }
        }
        CommandOutput::ok(out)
    }
}

impl RemoteExec for FakeRemote {
    fn execute(&mut self, command: &str, _timeout: Duration) -> Result<CommandOutput, RemoteError> {
        self.commands.push(command.to_string());
        if let Some(delay) = self.exec_delay {
            std::thread::sleep(delay);
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }

        if let Some(rest) = command.strip_prefix("mkdir -p ") {
            self.dirs.insert(unquote(rest));
            return Ok(CommandOutput::ok(""));
        }
        if let Some(rest) = command.strip_prefix("cat > ") {
            return Ok(self.apply_write(rest));
        }
        if let Some(rest) = command.strip_prefix(": > ") {
            let path = unquote(rest);
            if let Some(mut cb) = self.on_write.take() {
                cb(&path);
            }
            self.files.insert(path, String::new());
            return Ok(CommandOutput::ok(""));
        }
        if let Some(rest) = command.strip_prefix("cat ") {
            let path = unquote(rest);
            return Ok(match self.files.get(&path) {
                Some(content) => CommandOutput::ok(content.clone()),
                None => CommandOutput::failed(
                    1,
                    format!("cat: {}: No such file or directory", path),
                ),
            });
        }
        if let Some(rest) = command.strip_prefix("ls -1 ") {
            let path = unquote(rest.trim_end_matches(" 2>/dev/null"));
            if !self.dirs.contains(&path) {
                return Ok(CommandOutput::failed(2, "no such directory"));
            }
            return Ok(CommandOutput::ok(self.list_children(&path)));
        }
        if let Some(rest) = command.strip_prefix("test -e ") {
            let path = unquote(rest);
            let exists = self.files.contains_key(&path) || self.dirs.contains(&path);
            return Ok(if exists {
                CommandOutput::ok("")
            } else {
                CommandOutput::failed(1, "")
            });
        }
        if let Some(rest) = command.strip_prefix("if [ -d ") {
            let (qpath, _) = rest.split_once(" ]").expect("delete shape");
            let path = unquote(qpath);
            if !self.dirs.remove(&path) {
                self.files.remove(&path);
            }
            return Ok(CommandOutput::ok(""));
        }
        if command.starts_with("bash -c ") {
            return Ok(self.apply_glob(command));
        }

        Ok(CommandOutput::failed(127, format!("unhandled: {}", command)))
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

const ROOT: &str = "/remote/proj";

fn setup() -> (Arc<Mutex<FakeRemote>>, Arc<SyncEngine>) {
    let fake = Arc::new(Mutex::new(FakeRemote::default()));
    let shared: Arc<Mutex<dyn RemoteExec>> = fake.clone();
    let engine = Arc::new(SyncEngine::new(shared, ROOT));
    (fake, engine)
}

fn remote_file(fake: &Arc<Mutex<FakeRemote>>, path: &str) -> Option<String> {
    fake.lock().unwrap().files.get(path).cloned()
}

fn command_log(fake: &Arc<Mutex<FakeRemote>>) -> Vec<String> {
    fake.lock().unwrap().commands.clone()
}

// ── Read / write ─────────────────────────────────────────────────────────────

#[test]
fn write_then_read_hits_cache_before_any_sync() {
    let (fake, engine) = setup();

    engine.write("a.yaml", "v: 1\n").unwrap();
    assert_eq!(engine.read("a.yaml").unwrap(), "v: 1\n");
    assert_eq!(engine.status("a.yaml"), SyncState::Pending);
    assert_eq!(engine.pending_count(), 1);

    // Nothing touched the network.
    assert!(command_log(&fake).is_empty());
}

#[test]
fn read_miss_fetches_from_remote_as_synced() {
    let (fake, engine) = setup();
    fake.lock().unwrap().files.insert(
        format!("{}/config/main.yaml", ROOT),
        "remote content\n".to_string(),
    );

    assert_eq!(engine.read("config/main.yaml").unwrap(), "remote content\n");
    assert_eq!(engine.status("config/main.yaml"), SyncState::Synced);

    // Second read is served from the cache: still exactly one command.
    engine.read("config/main.yaml").unwrap();
    assert_eq!(command_log(&fake).len(), 1);
}

#[test]
fn read_missing_path_is_not_found() {
    let (_fake, engine) = setup();
    assert!(matches!(
        engine.read("nope.yaml"),
        Err(RemoteError::NotFound(_))
    ));
    // A failed fetch leaves nothing tracked.
    assert_eq!(engine.overall_status(), SyncState::Synced);
}

#[test]
fn last_write_wins_in_cache() {
    let (_fake, engine) = setup();
    engine.write("a.yaml", "first\n").unwrap();
    engine.write("a.yaml", "second\n").unwrap();
    assert_eq!(engine.read("a.yaml").unwrap(), "second\n");
    assert_eq!(engine.pending_count(), 1);
}

#[test]
fn invalid_paths_are_rejected() {
    let (_fake, engine) = setup();
    assert!(engine.write("../escape.yaml", "x").is_err());
    assert!(engine.read("/absolute").is_err());
}

// ── Synchronization ──────────────────────────────────────────────────────────

#[test]
fn sync_one_pushes_cached_content_and_creates_parents() {
    let (fake, engine) = setup();
    engine.write("nested/dir/file.yaml", "payload: true\n").unwrap();

    assert!(engine.sync_one("nested/dir/file.yaml"));
    assert_eq!(engine.status("nested/dir/file.yaml"), SyncState::Synced);
    assert_eq!(engine.pending_count(), 0);

    assert_eq!(
        remote_file(&fake, &format!("{}/nested/dir/file.yaml", ROOT)).as_deref(),
        Some("payload: true\n")
    );
    assert!(fake
        .lock()
        .unwrap()
        .dirs
        .contains(&format!("{}/nested/dir", ROOT)));
}

#[test]
fn sync_one_is_trivial_for_untracked_or_synced_paths() {
    let (fake, engine) = setup();
    assert!(engine.sync_one("untracked.yaml"));

    engine.write("a.yaml", "v\n").unwrap();
    assert!(engine.sync_one("a.yaml"));
    let commands_after_first = command_log(&fake).len();

    // Already synced: no further network traffic.
    assert!(engine.sync_one("a.yaml"));
    assert_eq!(command_log(&fake).len(), commands_after_first);
}

#[test]
fn sync_all_pushes_in_ascending_path_order() {
    let (fake, engine) = setup();
    engine.write("zeta.yaml", "z\n").unwrap();
    engine.write("alpha.yaml", "a\n").unwrap();
    engine.write("mid/file.yaml", "m\n").unwrap();

    assert!(engine.sync_all());
    assert_eq!(engine.overall_status(), SyncState::Synced);

    let writes: Vec<String> = command_log(&fake)
        .into_iter()
        .filter(|c| c.starts_with("cat > "))
        .collect();
    assert_eq!(writes.len(), 3);
    assert!(writes[0].contains("alpha.yaml"));
    assert!(writes[1].contains("mid/file.yaml"));
    assert!(writes[2].contains("zeta.yaml"));
}

#[test]
fn payload_with_shell_metacharacters_survives() {
    let (fake, engine) = setup();
    let payload = "cmd: $(hostname) `id -u` \"x\" 'y' \\ $HOME\n";
    engine.write("tricky.yaml", payload).unwrap();

    assert!(engine.sync_all());
    assert_eq!(
        remote_file(&fake, &format!("{}/tricky.yaml", ROOT)).as_deref(),
        Some(payload)
    );
}

// ── Failure isolation and retry ──────────────────────────────────────────────

#[test]
fn transport_failure_parks_path_in_error_state() {
    let (fake, engine) = setup();
    engine.write("a.yaml", "v1\n").unwrap();
    fake.lock().unwrap().fail_with = Some(RemoteError::connection("link down"));

    assert!(!engine.sync_all());
    assert_eq!(engine.status("a.yaml"), SyncState::Error);
    assert_eq!(engine.overall_status(), SyncState::Error);
    assert_eq!(engine.retry_count("a.yaml"), 1);

    let errors = engine.errors();
    assert!(!errors.get("a.yaml").unwrap().is_empty());

    // Error paths stay readable and writable from the cache.
    assert_eq!(engine.read("a.yaml").unwrap(), "v1\n");
    engine.write("a.yaml", "v1b\n").unwrap();
    assert_eq!(engine.status("a.yaml"), SyncState::Pending);
}

#[test]
fn one_failing_path_does_not_stop_the_others() {
    let (fake, engine) = setup();
    engine.write("a.yaml", "a\n").unwrap();
    engine.write("b.yaml", "b\n").unwrap();

    // Fail only the first write command (a.yaml syncs first).
    fake.lock().unwrap().fail_with = Some(RemoteError::timed_out("deadline"));
    assert!(!engine.sync_one("a.yaml"));
    fake.lock().unwrap().fail_with = None;

    assert!(engine.sync_all());
    assert_eq!(engine.status("a.yaml"), SyncState::Error);
    assert_eq!(engine.status("b.yaml"), SyncState::Synced);
    assert_eq!(engine.overall_status(), SyncState::Error);
}

#[test]
fn periodic_pass_skips_error_paths_until_retried() {
    let (fake, engine) = setup();
    engine.write("a.yaml", "v\n").unwrap();
    fake.lock().unwrap().fail_with = Some(RemoteError::connection("down"));
    assert!(!engine.sync_all());
    fake.lock().unwrap().fail_with = None;

    let before = command_log(&fake).len();
    // A pending-only pass has nothing to do for an errored path.
    assert!(engine.sync_all());
    assert_eq!(command_log(&fake).len(), before);
    assert_eq!(engine.status("a.yaml"), SyncState::Error);

    assert!(engine.retry_errors());
    assert_eq!(engine.status("a.yaml"), SyncState::Synced);
}

#[test]
fn full_failure_recovery_scenario() {
    let (fake, engine) = setup();

    engine.write("a.txt", "v1\n").unwrap();
    assert_eq!(engine.status("a.txt"), SyncState::Pending);

    assert!(engine.sync_all());
    assert_eq!(engine.status("a.txt"), SyncState::Synced);
    assert_eq!(
        remote_file(&fake, &format!("{}/a.txt", ROOT)).as_deref(),
        Some("v1\n")
    );

    engine.write("a.txt", "v2\n").unwrap();
    assert_eq!(engine.status("a.txt"), SyncState::Pending);

    fake.lock().unwrap().fail_with = Some(RemoteError::connection("injected"));
    assert!(!engine.sync_all());
    assert_eq!(engine.status("a.txt"), SyncState::Error);
    assert!(!engine.errors().get("a.txt").unwrap().is_empty());
    // Remote still holds the old value.
    assert_eq!(
        remote_file(&fake, &format!("{}/a.txt", ROOT)).as_deref(),
        Some("v1\n")
    );

    fake.lock().unwrap().fail_with = None;
    assert!(engine.retry_errors());
    assert_eq!(engine.status("a.txt"), SyncState::Synced);
    assert!(engine.errors().is_empty());
    assert_eq!(
        remote_file(&fake, &format!("{}/a.txt", ROOT)).as_deref(),
        Some("v2\n")
    );
}

// ── Coalescing and in-flight writes ──────────────────────────────────────────

#[test]
fn write_during_inflight_sync_reenters_pending() {
    let (fake, engine) = setup();
    engine.write("a.yaml", "v1\n").unwrap();

    // While the v1 transfer is in flight, a newer write lands.
    {
        let engine = engine.clone();
        fake.lock().unwrap().on_write = Some(Box::new(move |_path| {
            engine.write("a.yaml", "v2\n").unwrap();
        }));
    }

    // The transfer itself succeeded, but the path must re-enter Pending.
    assert!(engine.sync_one("a.yaml"));
    assert_eq!(engine.status("a.yaml"), SyncState::Pending);
    assert_eq!(engine.pending_count(), 1);
    assert_eq!(
        remote_file(&fake, &format!("{}/a.yaml", ROOT)).as_deref(),
        Some("v1\n")
    );

    // The following pass transfers the newer content.
    assert!(engine.sync_all());
    assert_eq!(engine.status("a.yaml"), SyncState::Synced);
    assert_eq!(
        remote_file(&fake, &format!("{}/a.yaml", ROOT)).as_deref(),
        Some("v2\n")
    );
}

#[test]
fn burst_of_writes_coalesces_to_one_transfer() {
    let (fake, engine) = setup();
    for i in 0..10 {
        engine.write("a.yaml", &format!("version {}\n", i)).unwrap();
    }
    assert!(engine.sync_all());

    let writes = command_log(&fake)
        .iter()
        .filter(|c| c.starts_with("cat > "))
        .count();
    assert_eq!(writes, 1);
    assert_eq!(
        remote_file(&fake, &format!("{}/a.yaml", ROOT)).as_deref(),
        Some("version 9\n")
    );
}

// ── Status aggregation and observer ──────────────────────────────────────────

#[test]
fn overall_status_is_most_severe() {
    let (fake, engine) = setup();
    fake.lock()
        .unwrap()
        .files
        .insert(format!("{}/clean.yaml", ROOT), "ok\n".to_string());

    engine.read("clean.yaml").unwrap();
    assert_eq!(engine.overall_status(), SyncState::Synced);

    engine.write("dirty.yaml", "d\n").unwrap();
    assert_eq!(engine.overall_status(), SyncState::Pending);

    engine.write("broken.yaml", "b\n").unwrap();
    fake.lock().unwrap().fail_with = Some(RemoteError::connection("down"));
    engine.sync_one("broken.yaml");
    assert_eq!(engine.overall_status(), SyncState::Error);
}

#[derive(Default)]
struct Recorder(Mutex<Vec<(String, SyncState)>>);

impl SyncObserver for Recorder {
    fn state_changed(&self, path: &str, state: SyncState) {
        self.0.lock().unwrap().push((path.to_string(), state));
    }
}

#[test]
fn observer_sees_every_transition() {
    let fake = Arc::new(Mutex::new(FakeRemote::default()));
    let shared: Arc<Mutex<dyn RemoteExec>> = fake.clone();
    let recorder = Arc::new(Recorder::default());
    let engine = SyncEngine::new(shared, ROOT).with_observer(recorder.clone());

    engine.write("a.yaml", "v\n").unwrap();
    engine.sync_one("a.yaml");

    let events = recorder.0.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            ("a.yaml".to_string(), SyncState::Pending),
            ("a.yaml".to_string(), SyncState::Syncing),
            ("a.yaml".to_string(), SyncState::Synced),
        ]
    );
}

// ── Directory operations ─────────────────────────────────────────────────────

#[test]
fn dir_ops_go_straight_to_the_remote() {
    let (fake, engine) = setup();
    {
        let mut remote = fake.lock().unwrap();
        remote.dirs.insert(format!("{}/config", ROOT));
        remote
            .files
            .insert(format!("{}/config/main.yaml", ROOT), "m\n".into());
        remote
            .files
            .insert(format!("{}/config/ref.yaml", ROOT), "r\n".into());
    }

    assert_eq!(engine.list_dir("config"), vec!["main.yaml", "ref.yaml"]);
    assert!(engine.exists("config/main.yaml"));
    assert!(!engine.exists("config/missing.yaml"));
    assert_eq!(engine.list_dir("no/such/dir"), Vec::<String>::new());

    engine.mkdir("results").unwrap();
    assert!(fake.lock().unwrap().dirs.contains(&format!("{}/results", ROOT)));
}

#[test]
fn exists_short_circuits_on_tracked_paths() {
    let (fake, engine) = setup();
    engine.write("fresh.yaml", "new\n").unwrap();

    // Tracked but never synced: exists without any network traffic.
    assert!(engine.exists("fresh.yaml"));
    assert!(command_log(&fake).is_empty());
}

#[test]
fn delete_evicts_cache_and_removes_remote() {
    let (fake, engine) = setup();
    engine.write("gone.yaml", "x\n").unwrap();
    assert!(engine.sync_all());

    engine.delete("gone.yaml").unwrap();
    assert!(remote_file(&fake, &format!("{}/gone.yaml", ROOT)).is_none());
    assert_eq!(engine.pending_count(), 0);
    // Untracked again: a read must fetch, and the file is gone.
    assert!(matches!(
        engine.read("gone.yaml"),
        Err(RemoteError::NotFound(_))
    ));
}

#[test]
fn glob_and_load_project_warm_the_cache() {
    let (fake, engine) = setup();
    {
        let mut remote = fake.lock().unwrap();
        remote
            .files
            .insert(format!("{}/config/main.yaml", ROOT), "m\n".into());
        remote
            .files
            .insert(format!("{}/config/sub/ref.yaml", ROOT), "r\n".into());
        remote
            .files
            .insert(format!("{}/data/raw.bin", ROOT), "b\n".into());
    }

    let mut matches = engine.glob("config/**/*.yaml");
    matches.sort();
    assert_eq!(matches, vec!["config/main.yaml", "config/sub/ref.yaml"]);

    engine.load_project(&["config/**/*.yaml"]);
    assert_eq!(engine.status("config/main.yaml"), SyncState::Synced);
    assert_eq!(engine.status("config/sub/ref.yaml"), SyncState::Synced);

    // Cached now: reads are network-free.
    let before = command_log(&fake).len();
    engine.read("config/main.yaml").unwrap();
    assert_eq!(command_log(&fake).len(), before);
}

// ── Background worker ────────────────────────────────────────────────────────

fn wait_for<F: Fn() -> bool>(deadline: Duration, predicate: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}

#[test]
fn worker_syncs_pending_writes_and_stops_cleanly() {
    let (fake, engine) = setup();
    let worker = SyncWorker::start(engine.clone(), Duration::from_millis(20)).unwrap();

    engine.write("bg.yaml", "from worker\n").unwrap();
    assert!(wait_for(Duration::from_secs(5), || {
        engine.status("bg.yaml") == SyncState::Synced
    }));
    assert_eq!(
        remote_file(&fake, &format!("{}/bg.yaml", ROOT)).as_deref(),
        Some("from worker\n")
    );

    assert!(worker.stop(Duration::from_secs(5)));
}

#[test]
fn worker_stop_times_out_on_a_hung_transfer() {
    let (fake, engine) = setup();
    fake.lock().unwrap().exec_delay = Some(Duration::from_secs(2));

    let worker = SyncWorker::start(engine.clone(), Duration::from_millis(10)).unwrap();
    engine.write("slow.yaml", "s\n").unwrap();

    // Let the worker enter the slow network call, then demand a fast stop.
    std::thread::sleep(Duration::from_millis(500));
    assert!(!worker.stop(Duration::from_millis(100)));
}

#[test]
fn worker_keeps_running_after_per_path_failures() {
    let (fake, engine) = setup();
    fake.lock().unwrap().fail_with = Some(RemoteError::connection("down"));

    let worker = SyncWorker::start(engine.clone(), Duration::from_millis(20)).unwrap();
    engine.write("a.yaml", "v\n").unwrap();
    assert!(wait_for(Duration::from_secs(5), || {
        engine.status("a.yaml") == SyncState::Error
    }));

    // The loop survived the failure; a recovered link plus a fresh write
    // still syncs.
    fake.lock().unwrap().fail_with = None;
    engine.write("b.yaml", "w\n").unwrap();
    assert!(wait_for(Duration::from_secs(5), || {
        engine.status("b.yaml") == SyncState::Synced
    }));

    assert!(worker.stop(Duration::from_secs(5)));
}
