fn main() {
    autotest::cli::run();
}
