use std::path::PathBuf;

use reqchain::prelude::{Agent, FileOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: multipart_upload <file>")?;

    let mut request = Agent::new()
        .post("https://api.example.com/v1/upload")
        .force_type("multipart")
        .send("title=report")
        .send_file_with(&path, FileOptions::new().field_name("attachment"))
        .set_curl_command(true);

    println!("{}", request.as_curl_command()?);
    let response = request.end()?;
    println!("status={}", response.status());
    Ok(())
}
