//! Tuple collection benchmarks using divan
//!
//! Appending to array lists and scanning them by cursor and by position.

use mdxcalc::eval::{TupleCollections, TupleIterable, TupleList};
use mdxcalc::model::{Cube, CubeBuilder, DimensionType, MemberRef};
use std::sync::Arc;

fn main() {
    divan::main();
}

fn cube() -> Arc<Cube> {
    let mut b = CubeBuilder::new("Bench");
    b.dimension("Time", DimensionType::Time);
    b.hierarchy("Time", None, true, &["Year"]).unwrap();
    b.member("[Time]", None, "1997").unwrap();
    b.dimension("Store", DimensionType::Standard);
    b.hierarchy("Store", None, true, &["State"]).unwrap();
    b.member("[Store]", None, "CA").unwrap();
    b.measure("Unit Sales").unwrap();
    b.build().unwrap()
}

fn pair() -> [MemberRef; 2] {
    let cube = cube();
    [
        cube.lookup_member("[Time].[1997]").unwrap().clone(),
        cube.lookup_member("[Store].[CA]").unwrap().clone(),
    ]
}

fn filled(len: usize) -> TupleList {
    let tuple = pair();
    let mut list = TupleList::array(2, 10, 0);
    for _ in 0..len {
        list.add_tuple(&tuple).unwrap();
    }
    list
}

// === Append Benchmarks ===

mod append {
    use super::*;

    #[divan::bench(args = [100, 10_000])]
    fn unbounded(bencher: divan::Bencher, len: usize) {
        let tuple = pair();
        bencher.bench_local(|| {
            let mut list = TupleList::array(2, 10, 0);
            for _ in 0..len {
                list.add_tuple(divan::black_box(&tuple)).unwrap();
            }
            list
        });
    }

    #[divan::bench(args = [100, 10_000])]
    fn limited(bencher: divan::Bencher, len: usize) {
        let tuple = pair();
        let collections = TupleCollections::new(len);
        bencher.bench_local(|| {
            let mut list = collections.create_list(2);
            for _ in 0..len {
                list.add_tuple(divan::black_box(&tuple)).unwrap();
            }
            list
        });
    }
}

// === Scan Benchmarks ===

mod scan {
    use super::*;

    #[divan::bench]
    fn cursor(bencher: divan::Bencher) {
        let list = filled(10_000);
        bencher.bench_local(|| {
            let mut cursor = divan::black_box(&list).tuple_cursor();
            let mut n = 0;
            while cursor.forward() {
                n += cursor.current().len();
            }
            n
        });
    }

    #[divan::bench]
    fn positional(bencher: divan::Bencher) {
        let list = filled(10_000);
        bencher.bench_local(|| {
            let list = divan::black_box(&list);
            (0..list.len())
                .filter_map(|i| list.get(i))
                .map(|t| t.len())
                .sum::<usize>()
        });
    }
}
