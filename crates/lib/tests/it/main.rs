/*! Integration tests for QOF.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - book: counters, options, dirty tracking and teardown of books
 * - class: generic parameter access and choice tables
 * - collection: membership and the collection/instance back-reference
 * - copy: deep and shallow copies between books
 * - event: notifications raised by the lifecycle
 * - instance: edit brackets and dirty tracking through the public API
 * - object: descriptors, hooks and generic enumeration
 * - session: begin/load/save against the in-memory backend
 * - value: identifiers, numerics and value comparison
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("qof=info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

mod book;
mod class;
mod collection;
mod copy;
mod event;
mod instance;
mod object;
mod value;
