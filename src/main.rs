fn main() {
    vitara_lib::run()
}
