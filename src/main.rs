use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    standin::cli::main()
}
