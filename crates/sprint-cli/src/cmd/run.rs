use crate::cmd::step::{persist, render};
use crate::tracker;
use sprint_core::controller::{SprintController, Step};
use sprint_core::signal::Vocabulary;
use std::io::{BufRead, Write};
use std::path::Path;

pub fn run(root: &Path, sprint: u32, json: bool) -> anyhow::Result<()> {
    let config = tracker::load_sprints(root)?;
    let vocabulary = Vocabulary::new(&config.signals);
    let validator = tracker::validator(root, &config);
    let mut worker = tracker::worker(root, &config);

    tracker::with_store(root, |store| {
        let mut ctl = SprintController::new(store, &config, &validator, worker.as_mut());
        let stdin = std::io::stdin();
        let mut step = ctl.begin(sprint)?;

        loop {
            persist(root, sprint, &step, ctl.skipped())?;
            render(&step, json)?;

            let checkpoint = match &step {
                Step::Await(prompt) => prompt.checkpoint.clone(),
                Step::Compact { resume } => resume.clone(),
                Step::Held(_) => {
                    if !json {
                        println!("Pick up later with `sprint step {sprint} <reply>`.");
                    }
                    return Ok(());
                }
                Step::Completed(_) => return Ok(()),
            };

            if !json {
                print!("> ");
                std::io::stdout().flush()?;
            }
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                if !json {
                    println!("\nInput closed. Pick up later with `sprint step {sprint} <reply>`.");
                }
                return Ok(());
            }
            step = ctl.advance(sprint, &checkpoint, vocabulary.parse(&line))?;
        }
    })
}
