mod client;
mod errors;

use std::path::Path;

use clap::{App, Arg};

use client::IFTerminalClient;
use errors::IFtResult;

fn main() -> IFtResult<()> {
    env_logger::init();
    let matches = App::new("zifterm")
        .version("0.1.0")
        .about("This terminal client for the zifvm Z-machine interpreter allows to play classic Interactive Fiction games like Zork.")
        .arg(Arg::new("STORY")
            .help("The input story file to play.")
            .required(true)
            .index(1))
        .get_matches();

    let story_file_name = matches.value_of("STORY").unwrap();
    let story_file_path = Path::new(story_file_name);

    let mut client = IFTerminalClient::with_story_file(story_file_path)?;
    client.run()
}
