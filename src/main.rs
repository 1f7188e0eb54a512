fn main() {
    fieldtrack_lib::run()
}
