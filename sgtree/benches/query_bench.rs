/*
* Licensed to Elasticsearch B.V. under one or more contributor
* license agreements. See the NOTICE file distributed with
* this work for additional information regarding copyright
* ownership. Elasticsearch B.V. licenses this file to you under
* the Apache License, Version 2.0 (the "License"); you may
* not use this file except in compliance with the License.
* You may obtain a copy of the License at
*
*  http://www.apache.org/licenses/LICENSE-2.0
*
* Unless required by applicable law or agreed to in writing,
* software distributed under the License is distributed on an
* "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
* KIND, either express or implied.  See the License for the
* specific language governing permissions and limitations
* under the License.
*/

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use sgtree::CoverTree;
use sgtree_points::Point;

const DIM: usize = 8;
const N: usize = 5_000;

fn random_tree() -> CoverTree {
    let mut rng = SmallRng::seed_from_u64(42);
    let tree = CoverTree::new_empty(DIM, 1.3, None);
    for uid in 0..N as u64 {
        let values: Vec<f64> = (0..DIM).map(|_| rng.gen_range(-100.0..100.0)).collect();
        tree.insert(Point::from(values), uid).unwrap();
    }
    tree.calc_maxdist();
    tree
}

fn random_point(rng: &mut SmallRng) -> Point {
    let values: Vec<f64> = (0..DIM).map(|_| rng.gen_range(-100.0..100.0)).collect();
    Point::from(values)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let tree = random_tree();
    let mut rng = SmallRng::seed_from_u64(7);

    c.bench_function("nearest", |b| {
        b.iter(|| tree.nearest(black_box(&random_point(&mut rng))))
    });

    c.bench_function("knn_10", |b| {
        b.iter(|| tree.knn(black_box(&random_point(&mut rng)), 10))
    });

    c.bench_function("insert", |b| {
        let mut uid = N as u64;
        b.iter(|| {
            tree.insert(black_box(random_point(&mut rng)), uid).unwrap();
            uid += 1;
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
