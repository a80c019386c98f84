mod query;
mod scenario;
mod storage;

#[ctor::ctor]
fn init() {
    colog::init();
}
