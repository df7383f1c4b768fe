#[macro_use]
extern crate bencher;

use bencher::Bencher;
use vidpak::frame::PackContext;

fn gradient_frame(width: u32, height: u32) -> Vec<u16> {
    (0..width * height)
        .map(|i| {
            let x = i % width;
            let y = i / width;
            ((x + y) & 0xFFF) as u16
        })
        .collect()
}

fn noisy_frame(width: u32, height: u32) -> Vec<u16> {
    let mut state: u32 = 0xC0FFEE;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state & 0xFFF) as u16
    };

    (0..width * height).map(|_| next()).collect()
}

fn pack_gradient(bench: &mut Bencher) {
    let ctx = PackContext::new(1024, 1024, 12, 64, 64).unwrap();
    let frame = gradient_frame(1024, 1024);

    bench.iter(|| {
        let packed = ctx.pack(&frame).unwrap();
        bencher::black_box(packed);
    })
}

fn unpack_gradient(bench: &mut Bencher) {
    let ctx = PackContext::new(1024, 1024, 12, 64, 64).unwrap();
    let frame = gradient_frame(1024, 1024);
    let packed = ctx.pack(&frame).unwrap();

    bench.iter(|| {
        let unpacked = ctx.unpack(&packed).unwrap();
        bencher::black_box(unpacked);
    })
}

fn pack_noise(bench: &mut Bencher) {
    let ctx = PackContext::new(1024, 1024, 12, 64, 64).unwrap();
    let frame = noisy_frame(1024, 1024);

    bench.iter(|| {
        let packed = ctx.pack(&frame).unwrap();
        bencher::black_box(packed);
    })
}

fn unpack_noise(bench: &mut Bencher) {
    let ctx = PackContext::new(1024, 1024, 12, 64, 64).unwrap();
    let frame = noisy_frame(1024, 1024);
    let packed = ctx.pack(&frame).unwrap();

    bench.iter(|| {
        let unpacked = ctx.unpack(&packed).unwrap();
        bencher::black_box(unpacked);
    })
}

benchmark_group!(pack_unpack, pack_gradient, unpack_gradient, pack_noise, unpack_noise);
benchmark_main!(pack_unpack);
