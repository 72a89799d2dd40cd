use lan_checkers::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());
    match command.as_str() {
        "serve" => serve().await?,
        "demo" => demo()?,
        other => {
            eprintln!("unknown command {other:?}; expected \"serve\" or \"demo\"");
            std::process::exit(2);
        }
    }
    Ok(())
}

/// Run a standalone relay that two players on the LAN can meet on.
async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let server = relay::RelayServer::bind(&format!("0.0.0.0:{PORT}")).await?;
    println!("Relay listening on {}", server.local_addr()?);
    println!("Session pin: {}", server.pin());
    server.run().await?;
    Ok(())
}

/// Pit the stock CPU against itself and print the game as it unfolds.
fn demo() -> Result<(), Box<dyn std::error::Error>> {
    println!("LAN Checkers - CPU exhibition match");
    println!("===================================\n");

    let mut black = HeuristicBot::new("Black CPU".to_string());
    let mut red = HeuristicBot::new("Red CPU".to_string());
    let mut game = Game::new(DEFAULT_DIM, DEFAULT_ROWS, Mode::LocalCpu);

    for turn in 1..=200 {
        let mover = game.side_to_move();
        let bot: &mut dyn Bot = match mover {
            Side::Black => &mut black,
            Side::Red => &mut red,
        };
        let name = bot.name().to_string();
        let outcome = game.play_cpu_turn(bot)?;

        println!("Turn {turn}: {name} ({mover})");
        println!("{}", game.board().render());

        if let Some(winner) = outcome.winner() {
            println!("{winner} wins after {turn} turns!");
            return Ok(());
        }
    }
    println!("No winner after 200 turns, calling it a draw.");
    Ok(())
}
