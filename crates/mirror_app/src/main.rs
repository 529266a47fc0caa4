//! Console front end: reads commands from stdin, prints the mirrored
//! transcript to stdout and the system log to stderr.
mod config;
mod console;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use engine_logging::{engine_info, engine_warn};
use mirror_core::Command;
use mirror_engine::{
    sweep_expired, ChromiumLauncher, CommandSender, DomTranscriptExtractor, EngineHandle,
    RETENTION,
};

use crate::config::AppConfig;
use crate::console::{parse_line, Input, Renderer, HELP};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?.resolved();

    if let Some(path) = engine_logging::initialize(&config.log) {
        engine_info!("Logging to {:?}", path);
    }
    if let Some(path) = &config_path {
        engine_info!("Loaded config from {:?}", path);
    }
    let swept = sweep_expired(
        &[config.engine.cache_dir.as_path(), config.log.dir.as_path()],
        RETENTION,
    );
    engine_info!("Startup cleanup removed {} expired files", swept);

    let engine = EngineHandle::spawn(
        config.engine.clone(),
        ChromiumLauncher::new(config.browser.clone()),
        DomTranscriptExtractor::new(),
    );
    spawn_input(engine.sender());

    let mut renderer = Renderer::new(io::stdout(), io::stderr());
    for event in engine.events() {
        renderer.render(&event)?;
    }
    renderer.close_system_line()?;

    let report = engine.join()?;
    engine_info!("Engine stopped after {} restarts", report.restarts);
    Ok(())
}

/// Forwards stdin lines as commands; end of input stops the engine.
fn spawn_input(sender: CommandSender) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    engine_warn!("Failed to read stdin: {}", err);
                    break;
                }
            };
            match parse_line(&line) {
                Ok(Input::Command(command)) => {
                    let stop = command == Command::Stop;
                    if !sender.send(command) || stop {
                        return;
                    }
                }
                Ok(Input::Help) => eprintln!("{HELP}"),
                Ok(Input::Empty) => {}
                Ok(Input::Unknown(word)) => eprintln!("unknown directive :{word} (try :help)"),
                Err(err) => eprintln!("{err}"),
            }
        }
        sender.send(Command::Stop);
    });
}
