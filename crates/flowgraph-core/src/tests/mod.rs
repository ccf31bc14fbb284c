/*! Test coverage for the block graph model.
 *
 * Builders lean on the graph mutators to keep links consistent, so these tests pin down the
 * bidirectional bookkeeping and the traversal orders analyses depend on.
 */

#![allow(unused_imports)]

mod graph_tests;
