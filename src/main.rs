fn main() -> Result<(), Box<dyn std::error::Error>> {
    issue_search::run()
}
