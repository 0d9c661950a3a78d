extern crate clap;
extern crate dracnet;
extern crate env_logger;

use std::sync::{
    Arc,
    Mutex,
    Weak,
};

use dracnet::link::{
    self,
    Link,
};
use dracnet::repr::{
    eth_types,
    ipv4_protocols,
    Arp,
    ArpOp,
    EthernetAddress,
    EthernetFrame,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
    Ipv4Packet,
    Ipv4Repr,
};
use dracnet::service::{
    Config,
    EthernetService,
    Received,
    Stack,
};
use dracnet::shell;

/// A link to a simulated gateway which answers ARP requests for its own
/// address and echo requests for any address.
struct SimulatedLan {
    dev_eth_addr: EthernetAddress,
    dev_ipv4_addr: Ipv4Address,
    gateway_eth_addr: EthernetAddress,
    gateway_ipv4_addr: Ipv4Address,
    ethernet: Mutex<Weak<EthernetService>>,
}

impl SimulatedLan {
    fn answer_arp(&self, eth_frame: &EthernetFrame<&[u8]>) -> Option<Vec<u8>> {
        let arp = Arp::deserialize(eth_frame.payload()).ok()?;
        if arp.op != ArpOp::Request || arp.target_proto_addr != self.gateway_ipv4_addr {
            return None;
        }

        let reply = Arp {
            op: ArpOp::Reply,
            source_hw_addr: self.gateway_eth_addr,
            source_proto_addr: self.gateway_ipv4_addr,
            target_hw_addr: arp.source_hw_addr,
            target_proto_addr: arp.source_proto_addr,
        };

        let mut buffer = vec![0; EthernetFrame::<&[u8]>::buffer_len(reply.buffer_len())];
        {
            let mut reply_frame = EthernetFrame::try_new(&mut buffer[..]).ok()?;
            reply_frame.set_dst_addr(arp.source_hw_addr);
            reply_frame.set_src_addr(self.gateway_eth_addr);
            reply_frame.set_payload_type(eth_types::ARP);
            reply.serialize(reply_frame.payload_mut()).ok()?;
        }
        Some(buffer)
    }

    fn answer_ping(&self, eth_frame: &EthernetFrame<&[u8]>) -> Option<Vec<u8>> {
        if eth_frame.dst_addr() != self.gateway_eth_addr {
            return None;
        }

        let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload()).ok()?;
        if ipv4_packet.protocol() != ipv4_protocols::ICMP {
            return None;
        }

        let icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload()).ok()?;
        let (id, seq) = match Icmpv4Repr::deserialize(&icmp_packet).ok()? {
            Icmpv4Repr::EchoRequest { id, seq } => (id, seq),
            _ => return None,
        };

        let icmp_repr = Icmpv4Repr::EchoReply { id, seq };
        let icmp_len = icmp_repr.buffer_len() + icmp_packet.payload().len();
        let ipv4_repr = Ipv4Repr {
            src_addr: ipv4_packet.dst_addr(),
            dst_addr: ipv4_packet.src_addr(),
            protocol: ipv4_protocols::ICMP,
            payload_len: icmp_len as u16,
        };

        let mut buffer = vec![0; EthernetFrame::<&[u8]>::buffer_len(ipv4_repr.buffer_len())];
        {
            let mut reply_frame = EthernetFrame::try_new(&mut buffer[..]).ok()?;
            reply_frame.set_dst_addr(eth_frame.src_addr());
            reply_frame.set_src_addr(self.gateway_eth_addr);
            reply_frame.set_payload_type(eth_types::IPV4);

            let ipv4_buffer = reply_frame.payload_mut();
            ipv4_repr.serialize(ipv4_buffer).ok()?;
            let mut reply_packet =
                Icmpv4Packet::try_new(&mut ipv4_buffer[Ipv4Packet::<&[u8]>::HEADER_LEN ..]).ok()?;
            reply_packet
                .payload_mut()
                .copy_from_slice(icmp_packet.payload());
            icmp_repr.serialize(&mut reply_packet);
        }
        Some(buffer)
    }
}

impl Link for SimulatedLan {
    fn send(&self, frame: &[u8]) -> link::Result<()> {
        let eth_frame = EthernetFrame::try_new(frame).map_err(|_| link::Error::Unknown("runt"))?;

        let answer = match eth_frame.payload_type() {
            eth_types::ARP => self.answer_arp(&eth_frame),
            eth_types::IPV4 => self.answer_ping(&eth_frame),
            _ => None,
        };

        // Deliver the answer as the receive interrupt would.
        let ethernet = self.ethernet.lock().unwrap().upgrade();
        if let (Some(mut answer), Some(ethernet)) = (answer, ethernet) {
            if let Received::Reply(reply) = ethernet.recv_frame(&mut answer[..]) {
                println!("Device replied with a {} byte frame.", reply.len());
            }
        }

        Ok(())
    }

    fn ethernet_addr(&self) -> EthernetAddress {
        self.dev_eth_addr
    }

    fn ipv4_addr(&self) -> Ipv4Address {
        self.dev_ipv4_addr
    }
}

fn parse<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str) -> T {
    let value = matches.value_of(name).unwrap();
    match value.parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("Invalid value '{}' for --{}.", value, name);
            std::process::exit(1);
        }
    }
}

/// Pings a host through a simulated gateway.
fn main() {
    env_logger::init();

    let matches = clap::App::new("ping")
        .about("Sends ICMP echo requests through a simulated gateway")
        .arg(
            clap::Arg::with_name("TARGET")
                .help("IPv4 address to ping")
                .default_value("10.0.2.2")
                .index(1),
        )
        .arg(
            clap::Arg::with_name("count")
                .long("count")
                .short("c")
                .value_name("COUNT")
                .help("Number of echo requests to send")
                .default_value("4")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("dev-mac")
                .long("dev-mac")
                .value_name("MAC")
                .help("MAC address of the device")
                .default_value("52:54:00:12:34:56")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("dev-ipv4")
                .long("dev-ipv4")
                .value_name("IPV4")
                .help("IPv4 address of the device")
                .default_value("10.0.2.15")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("gateway")
                .long("gateway")
                .value_name("IPV4")
                .help("IPv4 address of the default gateway")
                .default_value("10.0.2.2")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("mask")
                .long("mask")
                .value_name("IPV4")
                .help("Subnet mask of the device")
                .default_value("255.255.255.0")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("verbose")
                .long("verbose")
                .short("v")
                .help("Print the sequence number of each echo request"),
        )
        .get_matches();

    let count: usize = parse(&matches, "count");
    let gateway: Ipv4Address = parse(&matches, "gateway");

    let lan = Arc::new(SimulatedLan {
        dev_eth_addr: parse(&matches, "dev-mac"),
        dev_ipv4_addr: parse(&matches, "dev-ipv4"),
        gateway_eth_addr: EthernetAddress::new([0x52, 0x55, 0x0A, 0x00, 0x02, 0x02]),
        gateway_ipv4_addr: gateway,
        ethernet: Mutex::new(Weak::new()),
    });

    let stack = Stack::new(lan.clone(), Config::new(gateway, parse(&matches, "mask")));
    *lan.ethernet.lock().unwrap() = Arc::downgrade(&stack.ethernet);

    if let Err(err) = stack.arp.announce(gateway) {
        eprintln!("Unable to announce ourselves to {}: {:?}.", gateway, err);
    }

    let target = matches.value_of("TARGET").unwrap();
    let args = if matches.is_present("verbose") {
        format!("{} -v", target)
    } else {
        target.to_string()
    };

    for _ in 0 .. count {
        let mut out = String::new();
        shell::ping(&stack.icmpv4, &args, &mut out).unwrap();
        print!("{}", out);

        while let Some(reply) = stack.icmpv4.recv_reply() {
            println!(
                "Echo reply from {}: id=0x{:04X} seq={}",
                reply.src_addr, reply.id, reply.seq
            );
        }
    }
}
