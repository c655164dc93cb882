//! Interactive menu and per-session command loop.
//!
//! All filesystem work is submitted through the task worker, so
//! several shells pointed at the same store would serialize cleanly.
//! The session travels into each submitted task and back out, since
//! descriptor state lives in it.

use std::io::{self, BufRead, Write as _};

use anyhow::Result;
use slatefs::worker::TaskWorker;
use slatefs::{
    DescriptorId, EntryKind, OpenMode, Session, SlateFs, SlotId,
};

/// Outer loop: register, login, or quit. A successful login drops into
/// the command loop and returns here on logout.
pub async fn menu(worker: &TaskWorker) -> Result<()> {
    println!("SlateFs shell. Commands: register, login, exit");
    loop {
        let Some(line) = prompt("> ")? else {
            return Ok(());
        };
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("register") => {
                let (Some(name), Some(secret)) = (parts.next(), parts.next()) else {
                    println!("usage: register <name> <secret>");
                    continue;
                };
                let (name, secret) = (name.to_string(), secret.to_string());
                match worker.submit(move |fs| fs.register(&name, &secret)).await? {
                    Ok(id) => println!("registered account {id}"),
                    Err(err) => println!("error: {err}"),
                }
            }
            Some("login") => {
                let (Some(name), Some(secret)) = (parts.next(), parts.next()) else {
                    println!("usage: login <name> <secret>");
                    continue;
                };
                let (name, secret) = (name.to_string(), secret.to_string());
                match worker.submit(move |fs| fs.login(&name, &secret)).await? {
                    Ok(session) => command_loop(worker, session).await?,
                    Err(err) => println!("error: {err}"),
                }
            }
            Some("exit") | Some("quit") => return Ok(()),
            Some(other) => println!("unknown command '{other}'"),
            None => {}
        }
    }
}

/// Run a session-bound operation on the worker. The session moves into
/// the task and is written back once the task completes.
async fn run_op<R, F>(worker: &TaskWorker, session: &mut Session, f: F) -> Result<slatefs::Result<R>>
where
    F: FnOnce(&SlateFs, &mut Session) -> slatefs::Result<R> + Send + 'static,
    R: Send + 'static,
{
    let mut moved = session.clone();
    let (moved, result) = worker
        .submit(move |fs| {
            let result = f(fs, &mut moved);
            (moved, result)
        })
        .await?;
    *session = moved;
    Ok(result)
}

async fn command_loop(worker: &TaskWorker, mut session: Session) -> Result<()> {
    println!("logged in; type 'help' for commands, 'logout' to leave");
    loop {
        let cwd = run_op(worker, &mut session, |fs, s| Ok(fs.current_path(s))).await??;
        let Some(line) = prompt(&format!("{cwd} $ "))? else {
            return Ok(());
        };
        let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
        let Some(cmd) = tokens.first().cloned() else {
            continue;
        };
        let args = &tokens[1..];

        let outcome = match cmd.as_str() {
            "help" => {
                print_help();
                Ok(())
            }
            "logout" | "exit" => return Ok(()),
            "pwd" => {
                println!("{cwd}");
                Ok(())
            }
            "cd" => cd(worker, &mut session, args).await?,
            "dir" | "ls" => dir(worker, &mut session, args).await?,
            "tree" => tree(worker, &mut session, args).await?,
            "mkdir" => make(worker, &mut session, args, EntryKind::Directory).await?,
            "create" => make(worker, &mut session, args, EntryKind::File).await?,
            "delete" | "rm" => delete(worker, &mut session, args, false).await?,
            "rmdir" => delete(worker, &mut session, args, true).await?,
            "open" => open(worker, &mut session, args).await?,
            "close" => close(worker, &mut session, args).await?,
            "read" => read(worker, &mut session, args).await?,
            "write" => write(worker, &mut session, args).await?,
            "lseek" => lseek(worker, &mut session, args).await?,
            "head" => head_tail(worker, &mut session, args, true).await?,
            "tail" => head_tail(worker, &mut session, args, false).await?,
            "copy" | "cp" => transfer(worker, &mut session, args, true).await?,
            "move" | "mv" => transfer(worker, &mut session, args, false).await?,
            "flock" => flock(worker, &mut session, args).await?,
            "import" => import(worker, &mut session, args).await?,
            "export" => export(worker, &mut session, args).await?,
            "save" => worker.submit(|fs| fs.save()).await?,
            other => {
                println!("unknown command '{other}'; try 'help'");
                Ok(())
            }
        };
        if let Err(err) = outcome {
            println!("error: {err}");
        }
    }
}

fn print_help() {
    println!(
        "\
namespace:  cd <path> | pwd | dir [path] | tree [path]
            mkdir <name> | create <name> | delete <path> | rmdir [-f] <path>
files:      open <path> <r|w|rw> | close <path> | read <path> [n]
            write [-o] <path> <text...> | lseek <path> <offset>
            head <path> [n] | tail <path> [n] | flock <path>
transfer:   copy <path> <dir> | move <path> <dir>
            import <host-file> <name> | export <path> <host-file>
other:      save | logout"
    );
}

async fn resolve(
    worker: &TaskWorker,
    session: &mut Session,
    path: &str,
) -> Result<slatefs::Result<SlotId>> {
    let path = path.to_string();
    run_op(worker, session, move |fs, s| fs.resolve(s, &path)).await
}

/// Look up the open descriptor a path refers to in this session.
async fn open_fd(
    worker: &TaskWorker,
    session: &mut Session,
    path: &str,
) -> Result<slatefs::Result<DescriptorId>> {
    let slot = match resolve(worker, session, path).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    match session.find_open(slot) {
        Some(fd) => Ok(Ok(fd)),
        None => Ok(Err(slatefs::Error::InvalidArgument(format!(
            "'{path}' is not open"
        )))),
    }
}

async fn cd(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let Some(path) = args.first().cloned() else {
        println!("usage: cd <path>");
        return Ok(Ok(()));
    };
    run_op(worker, session, move |fs, s| fs.change_dir(s, &path)).await
}

async fn dir(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let target = match args.first() {
        Some(path) => match resolve(worker, session, path).await? {
            Ok(slot) => slot,
            Err(err) => return Ok(Err(err)),
        },
        None => session.cwd,
    };
    let rows = match run_op(worker, session, move |fs, _| fs.list_dir(target)).await? {
        Ok(rows) => rows,
        Err(err) => return Ok(Err(err)),
    };
    for row in rows {
        let kind = if row.kind.is_dir() { "<dir>" } else { "     " };
        println!(
            "{kind} {:>5}  {}  {}",
            row.size,
            row.modified.format("%Y-%m-%d %H:%M:%S"),
            row.name
        );
    }
    Ok(Ok(()))
}

async fn tree(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let target = match args.first() {
        Some(path) => match resolve(worker, session, path).await? {
            Ok(slot) => slot,
            Err(err) => return Ok(Err(err)),
        },
        None => session.cwd,
    };
    let rows = match run_op(worker, session, move |fs, _| fs.tree(target)).await? {
        Ok(rows) => rows,
        Err(err) => return Ok(Err(err)),
    };
    for row in rows {
        let marker = if row.kind.is_dir() { "/" } else { "" };
        println!("{}{}{marker}", "  ".repeat(row.depth), row.name);
    }
    Ok(Ok(()))
}

async fn make(
    worker: &TaskWorker,
    session: &mut Session,
    args: &[String],
    kind: EntryKind,
) -> Result<slatefs::Result<()>> {
    let Some(name) = args.first().cloned() else {
        println!("usage: {} <name>", if kind.is_dir() { "mkdir" } else { "create" });
        return Ok(Ok(()));
    };
    let result = run_op(worker, session, move |fs, s| {
        fs.create(s, s.cwd, &name, kind)
    })
    .await?;
    Ok(result.map(|_| ()))
}

async fn delete(
    worker: &TaskWorker,
    session: &mut Session,
    args: &[String],
    dir_mode: bool,
) -> Result<slatefs::Result<()>> {
    let force = dir_mode && args.first().is_some_and(|a| a == "-f");
    let Some(path) = args.get(usize::from(force)).cloned() else {
        println!("usage: {} <path>", if dir_mode { "rmdir [-f]" } else { "delete" });
        return Ok(Ok(()));
    };
    let slot = match resolve(worker, session, &path).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    if force && !confirm(&format!("recursively delete '{path}'?"))? {
        return Ok(Ok(()));
    }
    let result = run_op(worker, session, move |fs, s| fs.delete(s, slot, force)).await?;
    Ok(result.map(|removed| {
        if removed > 1 {
            println!("removed {removed} entries");
        }
    }))
}

async fn open(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let (Some(path), Some(mode)) = (args.first().cloned(), args.get(1)) else {
        println!("usage: open <path> <r|w|rw>");
        return Ok(Ok(()));
    };
    let mode: OpenMode = match mode.parse() {
        Ok(mode) => mode,
        Err(err) => return Ok(Err(err)),
    };
    let slot = match resolve(worker, session, &path).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    let result = run_op(worker, session, move |fs, s| fs.open(s, slot, mode)).await?;
    Ok(result.map(|fd| println!("opened '{path}' as descriptor {fd}")))
}

async fn close(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let Some(path) = args.first().cloned() else {
        println!("usage: close <path>");
        return Ok(Ok(()));
    };
    let fd = match open_fd(worker, session, &path).await? {
        Ok(fd) => fd,
        Err(err) => return Ok(Err(err)),
    };
    run_op(worker, session, move |fs, s| fs.close(s, fd)).await
}

async fn read(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let Some(path) = args.first().cloned() else {
        println!("usage: read <path> [n]");
        return Ok(Ok(()));
    };
    let max_len = match args.get(1).map(|n| n.parse::<usize>()) {
        Some(Ok(n)) => Some(n),
        Some(Err(_)) => {
            println!("usage: read <path> [n]");
            return Ok(Ok(()));
        }
        None => None,
    };
    let fd = match open_fd(worker, session, &path).await? {
        Ok(fd) => fd,
        Err(err) => return Ok(Err(err)),
    };
    let result = run_op(worker, session, move |fs, s| fs.read(s, fd, max_len)).await?;
    Ok(result.map(|outcome| {
        println!("{}", String::from_utf8_lossy(&outcome.data));
        if outcome.clamped {
            println!("(reached end of file)");
        }
    }))
}

async fn write(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let overwrite = args.first().is_some_and(|a| a == "-o");
    let rest = &args[usize::from(overwrite)..];
    let (Some(path), text) = (rest.first().cloned(), rest[1.min(rest.len())..].join(" ")) else {
        println!("usage: write [-o] <path> <text...>");
        return Ok(Ok(()));
    };
    if text.is_empty() {
        println!("usage: write [-o] <path> <text...>");
        return Ok(Ok(()));
    }
    let fd = match open_fd(worker, session, &path).await? {
        Ok(fd) => fd,
        Err(err) => return Ok(Err(err)),
    };
    let result = run_op(worker, session, move |fs, s| {
        fs.write(s, fd, text.as_bytes(), overwrite)
    })
    .await?;
    Ok(result.map(|written| println!("wrote {written} bytes")))
}

async fn lseek(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let (Some(path), Some(Ok(offset))) = (
        args.first().cloned(),
        args.get(1).map(|n| n.parse::<i64>()),
    ) else {
        println!("usage: lseek <path> <offset>");
        return Ok(Ok(()));
    };
    let fd = match open_fd(worker, session, &path).await? {
        Ok(fd) => fd,
        Err(err) => return Ok(Err(err)),
    };
    let result = run_op(worker, session, move |fs, s| fs.seek(s, fd, offset)).await?;
    Ok(result.map(|pos| println!("position {pos}")))
}

async fn head_tail(
    worker: &TaskWorker,
    session: &mut Session,
    args: &[String],
    from_start: bool,
) -> Result<slatefs::Result<()>> {
    let Some(path) = args.first().cloned() else {
        println!("usage: {} <path> [n]", if from_start { "head" } else { "tail" });
        return Ok(Ok(()));
    };
    let n = args
        .get(1)
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(10);
    let slot = match resolve(worker, session, &path).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    let result = run_op(worker, session, move |fs, _| {
        if from_start {
            fs.head(slot, n)
        } else {
            fs.tail(slot, n)
        }
    })
    .await?;
    Ok(result.map(|range| {
        for (offset, line) in range.lines.iter().enumerate() {
            println!("{:>4}  {line}", range.start + offset);
        }
    }))
}

async fn transfer(
    worker: &TaskWorker,
    session: &mut Session,
    args: &[String],
    copying: bool,
) -> Result<slatefs::Result<()>> {
    let (Some(src), Some(dest)) = (args.first().cloned(), args.get(1).cloned()) else {
        println!("usage: {} <path> <dir>", if copying { "copy" } else { "move" });
        return Ok(Ok(()));
    };
    let src_slot = match resolve(worker, session, &src).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    let dest_slot = match resolve(worker, session, &dest).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    let result = run_op(worker, session, move |fs, s| {
        if copying {
            fs.copy(s, src_slot, dest_slot).map(|_| ())
        } else {
            fs.move_entry(src_slot, dest_slot)
        }
    })
    .await?;
    Ok(result)
}

async fn flock(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let Some(path) = args.first().cloned() else {
        println!("usage: flock <path>");
        return Ok(Ok(()));
    };
    let slot = match resolve(worker, session, &path).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    let result = run_op(worker, session, move |fs, s| fs.toggle_lock(s, slot)).await?;
    Ok(result.map(|outcome| {
        println!(
            "'{path}' is now {}",
            if outcome.locked { "locked" } else { "unlocked" }
        );
        if outcome.open_descriptor {
            println!("warning: you hold an open descriptor on it");
        }
    }))
}

async fn import(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let (Some(host), Some(name)) = (args.first(), args.get(1).cloned()) else {
        println!("usage: import <host-file> <name>");
        return Ok(Ok(()));
    };
    let data = match std::fs::read(host) {
        Ok(data) => data,
        Err(err) => return Ok(Err(err.into())),
    };
    let result = run_op(worker, session, move |fs, s| {
        fs.import(s, s.cwd, &name, &data)
    })
    .await?;
    Ok(result.map(|_| ()))
}

async fn export(worker: &TaskWorker, session: &mut Session, args: &[String]) -> Result<slatefs::Result<()>> {
    let (Some(path), Some(host)) = (args.first().cloned(), args.get(1).cloned()) else {
        println!("usage: export <path> <host-file>");
        return Ok(Ok(()));
    };
    let slot = match resolve(worker, session, &path).await? {
        Ok(slot) => slot,
        Err(err) => return Ok(Err(err)),
    };
    let data = match run_op(worker, session, move |fs, _| fs.export(slot)).await? {
        Ok(data) => data,
        Err(err) => return Ok(Err(err)),
    };
    if let Err(err) = std::fs::write(&host, &data) {
        return Ok(Err(err.into()));
    }
    println!("wrote {} bytes to {host}", data.len());
    Ok(Ok(()))
}

/// Print a prompt and read one trimmed line; None on end of input.
fn prompt(text: &str) -> Result<Option<String>> {
    print!("{text}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn confirm(question: &str) -> Result<bool> {
    Ok(prompt(&format!("{question} [y/N] "))?
        .is_some_and(|answer| answer.eq_ignore_ascii_case("y")))
}
