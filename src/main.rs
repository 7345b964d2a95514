#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    println!("🛰️  agent-fabric hub starting");
    let _ = agent_fabric::rocket().launch().await?;
    Ok(())
}
