/// Terminal player: plays a story file on stdin/stdout.
///
/// Links in the current passage are listed by number. Type a number to
/// follow one, `b` to go back, `s` to print a save token, `r TOKEN` to
/// restore one, `q` to quit.
///
/// Run with: cargo run --example terminal_player [story.ron]

use passage_engine::{MemoryHost, Story, StoryData, StoryEvent};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// `(target, display)` for every passage anchor in `html`.
fn links(html: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut rest = html;
    while let Some(at) = rest.find("data-passage=\"") {
        let after = &rest[at + "data-passage=\"".len()..];
        let Some(end) = after.find('"') else { break };
        let target = after[..end].to_string();
        let display = after[end..]
            .find('>')
            .and_then(|open| {
                let text = &after[end + open + 1..];
                text.find("</a>").map(|close| text[..close].to_string())
            })
            .unwrap_or_else(|| target.clone());
        found.push((target, display));
        rest = &after[end..];
    }
    found
}

/// Drop tags for terminal output.
fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    passage_engine::schema::passage::unescape_html(out.trim())
}

fn print_screen(story: &Story<MemoryHost>) -> Vec<(String, String)> {
    if let Some(message) = &story.host().error_screen {
        println!("\n!! {message}");
        return Vec::new();
    }
    let html = story.host().html().unwrap_or_default();
    println!(
        "\n== {} ==\n{}",
        story.host().passage_name().unwrap_or("?"),
        plain_text(html)
    );
    let choices = links(html);
    for (i, (_, display)) in choices.iter().enumerate() {
        println!("  {}. {}", i + 1, plain_text(display));
    }
    choices
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/lighthouse.ron"));
    let data = StoryData::load_from_ron(&path)?;
    let mut story = Story::builder(data).build(MemoryHost::new())?;

    story.on("checkpoint:adding", |e| {
        if let StoryEvent::CheckpointAdding { name: Some(name) } = e {
            println!("  (checkpoint: {name})");
        }
    });

    story.start()?;
    println!("{} by {}", story.name(), story.creator());
    let mut choices = print_screen(&story);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "q" => break,
            "s" => println!("save token: {}", story.save()?),
            "b" => match story.host_mut().back() {
                Some(frame) => story.pop_state(frame)?,
                None => println!("nothing to go back to"),
            },
            _ if line.starts_with("r ") => {
                if story.restore(&line[2..]).is_err() {
                    println!("that token could not be restored");
                }
            }
            _ => match line.parse::<usize>().ok().and_then(|n| choices.get(n.wrapping_sub(1))) {
                Some((target, _)) => {
                    let target = target.clone();
                    if let Err(err) = story.activate_link(&target) {
                        println!("{err}");
                    }
                }
                None => {
                    println!("pick a link number, or b / s / r TOKEN / q");
                    continue;
                }
            },
        }
        choices = print_screen(&story);
    }
    Ok(())
}
