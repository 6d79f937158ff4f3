use std::io::{self, Read};
use wikimark::wikitext_to_json;

fn main() {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .expect("Failed to read stdin");
    match wikitext_to_json(&input) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}
